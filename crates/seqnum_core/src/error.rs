//! Error types for the sequence engine.

use seqnum_store::{ReservationId, SlotStatus, StoreError};
use thiserror::Error;

/// Result type for engine operations.
pub type SequenceResult<T> = Result<T, SequenceError>;

/// Errors that can occur in sequence engine operations.
#[derive(Debug, Error)]
pub enum SequenceError {
    /// A pattern failed to compile.
    #[error("invalid pattern {pattern:?}: {message}")]
    InvalidPattern {
        /// The offending pattern string.
        pattern: String,
        /// What is wrong with it.
        message: String,
    },

    /// Rendering needed a context variable the caller did not supply.
    #[error("missing context variable: {name}")]
    MissingContextVariable {
        /// Name of the first unresolved variable, in token order.
        name: String,
    },

    /// Counter allocation lost the compare-and-swap race repeatedly.
    ///
    /// Surfaced after bounded retries instead of stalling the caller;
    /// retrying at the business-transaction level is the caller's call.
    #[error("allocation conflict on {sequence}/{scope}: gave up after {attempts} attempts")]
    AllocationConflict {
        /// The contended sequence.
        sequence: String,
        /// The contended scope.
        scope: String,
        /// How many compare-and-swap attempts were made.
        attempts: u32,
    },

    /// A reservation was requested for zero values.
    #[error("invalid reservation count: {count}")]
    InvalidCount {
        /// The rejected count.
        count: u64,
    },

    /// No reservation exists under the given id.
    #[error("reservation not found: {id}")]
    ReservationNotFound {
        /// The unknown id.
        id: ReservationId,
    },

    /// The reservation exists but holds no slot for the given value.
    #[error("slot for value {value} not found in reservation {id}")]
    SlotNotFound {
        /// The reservation that was inspected.
        id: ReservationId,
        /// The value no slot holds.
        value: u64,
    },

    /// The slot has already reached a terminal state.
    #[error("slot for value {value} in reservation {id} is already {status}")]
    SlotAlreadyTerminal {
        /// The reservation that was inspected.
        id: ReservationId,
        /// The slot's value.
        value: u64,
        /// The terminal state it is in.
        status: SlotStatus,
    },

    /// Voiding was requested for a number that was never issued.
    #[error("no issued number {value} on record for {sequence}/{scope}")]
    UnknownVoidTarget {
        /// The sequence the void targeted.
        sequence: String,
        /// The scope the void targeted.
        scope: String,
        /// The numeric value that has no committed slot.
        value: u64,
    },

    /// Voiding was requested for a number that is already gap-explained.
    #[error("number {value} on {sequence}/{scope} is already voided")]
    AlreadyVoided {
        /// The sequence the void targeted.
        sequence: String,
        /// The scope the void targeted.
        scope: String,
        /// The already-voided value.
        value: u64,
    },

    /// No sequence definition is registered under the given name.
    #[error("sequence definition not found: {name}")]
    DefinitionNotFound {
        /// The unknown sequence name.
        name: String,
    },

    /// A store operation failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl SequenceError {
    /// Creates an invalid-pattern error.
    pub fn invalid_pattern(pattern: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            message: message.into(),
        }
    }

    /// Creates a missing-context-variable error.
    pub fn missing_variable(name: impl Into<String>) -> Self {
        Self::MissingContextVariable { name: name.into() }
    }

    /// Creates an allocation-conflict error.
    pub fn allocation_conflict(
        sequence: impl Into<String>,
        scope: impl Into<String>,
        attempts: u32,
    ) -> Self {
        Self::AllocationConflict {
            sequence: sequence.into(),
            scope: scope.into(),
            attempts,
        }
    }

    /// Creates an unknown-void-target error.
    pub fn unknown_void_target(
        sequence: impl Into<String>,
        scope: impl Into<String>,
        value: u64,
    ) -> Self {
        Self::UnknownVoidTarget {
            sequence: sequence.into(),
            scope: scope.into(),
            value,
        }
    }

    /// Creates an already-voided error.
    pub fn already_voided(
        sequence: impl Into<String>,
        scope: impl Into<String>,
        value: u64,
    ) -> Self {
        Self::AlreadyVoided {
            sequence: sequence.into(),
            scope: scope.into(),
            value,
        }
    }

    /// Creates a definition-not-found error.
    pub fn definition_not_found(name: impl Into<String>) -> Self {
        Self::DefinitionNotFound { name: name.into() }
    }
}
