//! Engine configuration.

/// Configuration for a [`crate::SequenceManager`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How many compare-and-swap attempts an allocation makes before
    /// surfacing an allocation conflict.
    pub max_allocate_retries: u32,

    /// Principal recorded on audit/gap records when the caller passes an
    /// empty actor string.
    pub fallback_actor: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_allocate_retries: 16,
            fallback_actor: "system".to_string(),
        }
    }
}

impl EngineConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the compare-and-swap retry bound.
    #[must_use]
    pub const fn max_allocate_retries(mut self, retries: u32) -> Self {
        self.max_allocate_retries = retries;
        self
    }

    /// Sets the fallback actor.
    #[must_use]
    pub fn fallback_actor(mut self, actor: impl Into<String>) -> Self {
        self.fallback_actor = actor.into();
        self
    }
}
