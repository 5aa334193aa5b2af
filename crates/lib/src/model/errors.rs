//! Storage-collaborator error types.
//!
//! Implementations of [`crate::model::DataModel`] report failures through
//! these variants so the dispatcher can fold them into error envelopes
//! without knowing the storage technology.

use thiserror::Error;

/// Errors that can occur during storage operations.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ModelError {
    /// No record with the given identifier exists in the collection.
    #[error("Record not found: {id}")]
    RecordNotFound {
        /// The identifier that was looked up
        id: String,
    },

    /// A record handed to the storage operation is not usable.
    #[error("Invalid record for storage operation: {reason}")]
    InvalidRecord {
        /// Why the record was rejected
        reason: String,
    },

    /// Implementation-specific backend failure.
    #[error("Storage operation '{operation}' failed: {reason}")]
    Backend {
        /// The storage operation that failed
        operation: String,
        /// Implementation-provided detail
        reason: String,
    },
}

impl ModelError {
    /// Check if this error indicates a record was not found.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ModelError::RecordNotFound { .. })
    }

    /// Check if this error is an implementation-specific backend failure.
    pub fn is_backend_error(&self) -> bool {
        matches!(self, ModelError::Backend { .. })
    }

    /// Get the failed operation name for backend failures.
    pub fn operation(&self) -> Option<&str> {
        match self {
            ModelError::Backend { operation, .. } => Some(operation),
            _ => None,
        }
    }
}
