//! Field-mapping error types.
//!
//! This module defines structured error types for vocabulary configuration,
//! providing better error context and type safety compared to string-based
//! errors.

use thiserror::Error;

/// Errors that can occur while configuring a field vocabulary.
///
/// Mapping itself never fails at runtime: absent fields read as `None` and
/// unmapped keys follow the configured pass-through policy. The only failure
/// mode is an invalid vocabulary, which is rejected at construction.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum MappingError {
    /// Two client names map to the same server name, so the inverse mapping
    /// is not injective and client-ward translation would be ambiguous.
    #[error(
        "Ambiguous vocabulary: client fields '{first_client}' and '{second_client}' both map to server field '{server_field}'"
    )]
    AmbiguousVocabulary {
        /// The server field claimed by more than one client field
        server_field: String,
        /// The client field that claimed the server field first
        first_client: String,
        /// The client field that collided with it
        second_client: String,
    },
}

impl MappingError {
    /// Check if this error indicates an ambiguous (non-injective) vocabulary.
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, MappingError::AmbiguousVocabulary { .. })
    }

    /// Get the contested server field if this is an ambiguity error.
    pub fn server_field(&self) -> Option<&str> {
        match self {
            MappingError::AmbiguousVocabulary { server_field, .. } => Some(server_field),
        }
    }
}
