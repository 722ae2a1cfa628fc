//! Pattern compilation and rendering.
//!
//! A pattern is a human-authored template such as
//! `INV-{YEAR}-{COUNTER:00001}`. Compilation turns it into a reusable
//! [`TokenPlan`]; rendering is pure, so identical inputs always produce
//! identical output (which is what makes `preview` deterministic).
//!
//! Recognized placeholders:
//!
//! - `{COUNTER}` / `{COUNTER:00001}` - the allocated value, zero-padded to
//!   the width of the padding spec (`00001` is five digits, so width 5)
//! - `{YEAR}`, `{MONTH}`, `{DAY}` - taken from the reference date
//! - `{AnyOtherName}` - a context variable resolved from the caller's map

use crate::error::{SequenceError, SequenceResult};
use chrono::{DateTime, Datelike, Utc};
use std::collections::HashMap;

/// One compiled element of a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(String),
    Counter { width: usize },
    Year,
    Month,
    Day,
    Variable(String),
}

/// A compiled, reusable representation of a pattern string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPlan {
    pattern: String,
    tokens: Vec<Token>,
}

impl TokenPlan {
    /// Compiles a pattern string into a token plan.
    ///
    /// # Errors
    ///
    /// Returns [`SequenceError::InvalidPattern`] on unclosed or empty
    /// placeholders, malformed counter padding specs, padding specs on
    /// placeholders other than `COUNTER`, and placeholder names that are
    /// not valid identifiers.
    pub fn compile(pattern: &str) -> SequenceResult<Self> {
        let mut tokens = Vec::new();
        let mut literal = String::new();
        let mut chars = pattern.chars();

        while let Some(ch) = chars.next() {
            match ch {
                '{' => {
                    let mut placeholder = String::new();
                    let mut closed = false;
                    for inner in chars.by_ref() {
                        if inner == '}' {
                            closed = true;
                            break;
                        }
                        placeholder.push(inner);
                    }
                    if !closed {
                        return Err(SequenceError::invalid_pattern(
                            pattern,
                            "unclosed placeholder",
                        ));
                    }
                    if !literal.is_empty() {
                        tokens.push(Token::Literal(std::mem::take(&mut literal)));
                    }
                    tokens.push(Self::compile_placeholder(pattern, &placeholder)?);
                }
                '}' => {
                    return Err(SequenceError::invalid_pattern(pattern, "unmatched '}'"));
                }
                _ => literal.push(ch),
            }
        }
        if !literal.is_empty() {
            tokens.push(Token::Literal(literal));
        }

        Ok(Self {
            pattern: pattern.to_string(),
            tokens,
        })
    }

    fn compile_placeholder(pattern: &str, placeholder: &str) -> SequenceResult<Token> {
        if placeholder.is_empty() {
            return Err(SequenceError::invalid_pattern(pattern, "empty placeholder"));
        }

        if let Some(spec) = placeholder.strip_prefix("COUNTER:") {
            // Zero-padded digits, e.g. `00001` -> width 5. Only the final
            // digit may be nonzero.
            let mut digits = spec.chars().rev();
            let valid = digits.next().is_some_and(|c| c.is_ascii_digit())
                && digits.all(|c| c == '0');
            if !valid {
                return Err(SequenceError::invalid_pattern(
                    pattern,
                    format!("counter padding spec {spec:?} must be zero-padded digits"),
                ));
            }
            return Ok(Token::Counter { width: spec.len() });
        }

        match placeholder {
            "COUNTER" => Ok(Token::Counter { width: 1 }),
            "YEAR" => Ok(Token::Year),
            "MONTH" => Ok(Token::Month),
            "DAY" => Ok(Token::Day),
            name => {
                let mut chars = name.chars();
                let valid = chars
                    .next()
                    .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
                    && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
                if !valid {
                    return Err(SequenceError::invalid_pattern(
                        pattern,
                        format!("unknown placeholder {name:?}"),
                    ));
                }
                Ok(Token::Variable(name.to_string()))
            }
        }
    }

    /// Renders the plan for one counter value.
    ///
    /// Rendering is pure and side-effect-free. Counter values wider than
    /// the padding spec render at their full width, unpadded.
    ///
    /// # Errors
    ///
    /// Returns [`SequenceError::MissingContextVariable`] naming the first
    /// unresolved variable in token order.
    pub fn render(
        &self,
        counter_value: u64,
        variables: &HashMap<String, String>,
        reference_date: DateTime<Utc>,
    ) -> SequenceResult<String> {
        let mut out = String::with_capacity(self.pattern.len());
        for token in &self.tokens {
            match token {
                Token::Literal(text) => out.push_str(text),
                Token::Counter { width } => {
                    let width = *width;
                    out.push_str(&format!("{counter_value:0width$}"));
                }
                Token::Year => out.push_str(&format!("{:04}", reference_date.year())),
                Token::Month => out.push_str(&format!("{:02}", reference_date.month())),
                Token::Day => out.push_str(&format!("{:02}", reference_date.day())),
                Token::Variable(name) => match variables.get(name) {
                    Some(value) => out.push_str(value),
                    None => return Err(SequenceError::missing_variable(name)),
                },
            }
        }
        Ok(out)
    }

    /// Returns the first context variable the plan needs that `variables`
    /// does not supply, in token order.
    ///
    /// Lets callers validate variables *before* consuming a counter value,
    /// so a bad call fails without leaving an unissued number behind.
    #[must_use]
    pub fn first_missing_variable<'a>(
        &'a self,
        variables: &HashMap<String, String>,
    ) -> Option<&'a str> {
        self.tokens.iter().find_map(|token| match token {
            Token::Variable(name) if !variables.contains_key(name) => Some(name.as_str()),
            _ => None,
        })
    }

    /// Returns the source pattern string.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn date(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 10, 30, 0).unwrap()
    }

    fn no_vars() -> HashMap<String, String> {
        HashMap::new()
    }

    #[test]
    fn pattern_literal_only() {
        let plan = TokenPlan::compile("INVOICE").unwrap();
        assert_eq!(
            plan.render(1, &no_vars(), date(2024, 1, 1)).unwrap(),
            "INVOICE"
        );
    }

    #[test]
    fn pattern_counter_padded() {
        let plan = TokenPlan::compile("INV-{COUNTER:00001}").unwrap();
        assert_eq!(
            plan.render(42, &no_vars(), date(2024, 1, 1)).unwrap(),
            "INV-00042"
        );
    }

    #[test]
    fn pattern_counter_bare_is_unpadded() {
        let plan = TokenPlan::compile("{COUNTER}").unwrap();
        assert_eq!(plan.render(7, &no_vars(), date(2024, 1, 1)).unwrap(), "7");
    }

    #[test]
    fn pattern_counter_overflowing_padding_renders_full_width() {
        let plan = TokenPlan::compile("{COUNTER:000}").unwrap();
        assert_eq!(
            plan.render(12345, &no_vars(), date(2024, 1, 1)).unwrap(),
            "12345"
        );
    }

    #[test]
    fn pattern_date_placeholders() {
        let plan = TokenPlan::compile("{YEAR}/{MONTH}/{DAY}").unwrap();
        assert_eq!(
            plan.render(1, &no_vars(), date(2024, 3, 7)).unwrap(),
            "2024/03/07"
        );
    }

    #[test]
    fn pattern_context_variable_resolves() {
        let plan = TokenPlan::compile("{Department}-{COUNTER:00}").unwrap();
        let vars = HashMap::from([("Department".to_string(), "SALES".to_string())]);
        assert_eq!(plan.render(3, &vars, date(2024, 1, 1)).unwrap(), "SALES-03");
    }

    #[test]
    fn pattern_missing_variable_names_first_unresolved() {
        let plan = TokenPlan::compile("{A}-{B}").unwrap();
        let vars = HashMap::from([("B".to_string(), "x".to_string())]);
        let err = plan.render(1, &vars, date(2024, 1, 1)).unwrap_err();
        assert!(
            matches!(err, SequenceError::MissingContextVariable { ref name } if name.as_str() == "A"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn pattern_first_missing_variable_in_token_order() {
        let plan = TokenPlan::compile("{A}-{B}-{COUNTER}").unwrap();
        assert_eq!(plan.first_missing_variable(&no_vars()), Some("A"));

        let vars = HashMap::from([("A".to_string(), "x".to_string())]);
        assert_eq!(plan.first_missing_variable(&vars), Some("B"));

        let all = HashMap::from([
            ("A".to_string(), "x".to_string()),
            ("B".to_string(), "y".to_string()),
        ]);
        assert_eq!(plan.first_missing_variable(&all), None);
    }

    #[test]
    fn pattern_unclosed_placeholder_fails() {
        let err = TokenPlan::compile("INV-{COUNTER").unwrap_err();
        assert!(matches!(err, SequenceError::InvalidPattern { .. }));
    }

    #[test]
    fn pattern_unmatched_closing_brace_fails() {
        let err = TokenPlan::compile("INV-}").unwrap_err();
        assert!(matches!(err, SequenceError::InvalidPattern { .. }));
    }

    #[test]
    fn pattern_empty_placeholder_fails() {
        let err = TokenPlan::compile("INV-{}").unwrap_err();
        assert!(matches!(err, SequenceError::InvalidPattern { .. }));
    }

    #[test]
    fn pattern_counter_padding_with_terminal_nonzero_digit() {
        let plan = TokenPlan::compile("INV-{YEAR}-{COUNTER:00001}").unwrap();
        assert_eq!(
            plan.render(7, &no_vars(), date(2024, 6, 1)).unwrap(),
            "INV-2024-00007"
        );
    }

    #[test]
    fn pattern_malformed_counter_padding_fails() {
        for bad in ["{COUNTER:}", "{COUNTER:0x0}", "{COUNTER:123}", "{COUNTER: 0}"] {
            let err = TokenPlan::compile(bad).unwrap_err();
            assert!(
                matches!(err, SequenceError::InvalidPattern { .. }),
                "{bad} should not compile"
            );
        }
    }

    #[test]
    fn pattern_invalid_placeholder_name_fails() {
        for bad in ["{2fast}", "{a b}", "{A:00}"] {
            let err = TokenPlan::compile(bad).unwrap_err();
            assert!(
                matches!(err, SequenceError::InvalidPattern { .. }),
                "{bad} should not compile"
            );
        }
    }

    #[test]
    fn pattern_render_is_deterministic() {
        let plan = TokenPlan::compile("INV-{YEAR}-{COUNTER:0000}").unwrap();
        let a = plan.render(9, &no_vars(), date(2024, 6, 1)).unwrap();
        let b = plan.render(9, &no_vars(), date(2024, 6, 1)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, "INV-2024-0009");
    }

    proptest! {
        #[test]
        fn pattern_padded_counter_renders_at_least_width(
            prefix in "[A-Z]{0,8}",
            width in 1usize..9,
            value in 0u64..1_000_000,
        ) {
            let pattern = format!("{prefix}{{COUNTER:{}}}", "0".repeat(width));
            let plan = TokenPlan::compile(&pattern).unwrap();
            let rendered = plan
                .render(value, &HashMap::new(), date(2024, 1, 1))
                .unwrap();
            let digits = &rendered[prefix.len()..];
            prop_assert!(digits.len() >= width);
            prop_assert_eq!(digits.parse::<u64>().unwrap(), value);
        }

        #[test]
        fn pattern_brace_free_literals_render_verbatim(literal in "[^{}]{0,32}") {
            let plan = TokenPlan::compile(&literal).unwrap();
            let rendered = plan
                .render(1, &HashMap::new(), date(2024, 1, 1))
                .unwrap();
            prop_assert_eq!(rendered, literal);
        }
    }
}
