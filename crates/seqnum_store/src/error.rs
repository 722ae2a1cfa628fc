//! Error types for store operations.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store failed (I/O, connection, serialization, ...).
    #[error("store backend error: {message}")]
    Backend {
        /// Description of the failure.
        message: String,
    },

    /// Attempted to register a definition under a name that is taken.
    ///
    /// Definitions are immutable; replacing one is never valid.
    #[error("sequence definition already exists: {name}")]
    DefinitionExists {
        /// Name of the existing definition.
        name: String,
    },

    /// Attempted to insert a reservation whose id is already present.
    #[error("reservation already exists: {id}")]
    ReservationExists {
        /// The duplicated reservation id.
        id: String,
    },

    /// Attempted to update a reservation that was never inserted.
    #[error("reservation not found in store: {id}")]
    ReservationMissing {
        /// The missing reservation id.
        id: String,
    },
}

impl StoreError {
    /// Creates a backend error.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Creates a duplicate-definition error.
    pub fn definition_exists(name: impl Into<String>) -> Self {
        Self::DefinitionExists { name: name.into() }
    }

    /// Creates a duplicate-reservation error.
    pub fn reservation_exists(id: impl ToString) -> Self {
        Self::ReservationExists { id: id.to_string() }
    }

    /// Creates a missing-reservation error.
    pub fn reservation_missing(id: impl ToString) -> Self {
        Self::ReservationMissing { id: id.to_string() }
    }
}
