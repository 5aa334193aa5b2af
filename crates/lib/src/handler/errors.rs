//! Dispatch error types.

use thiserror::Error;

/// Errors raised at the dispatch boundary before any storage call is made.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The requested action is outside the supported set.
    #[error("Action '{action}' isn't supported")]
    UnsupportedAction {
        /// The raw action string from the payload
        action: String,
    },

    /// The action requires a record identifier and the payload carried none.
    #[error("Action '{action}' requires a record identifier")]
    MissingIdentifier {
        /// The action that was attempted
        action: String,
    },

    /// A move request carried no target identifier.
    #[error("Move request for '{id}' carries no target identifier")]
    MissingMoveTarget {
        /// The record that was to be moved
        id: String,
    },

    /// A mutating action reached a read-only handler.
    #[error("Action '{action}' is not available on a read-only handler")]
    ReadOnlyHandler {
        /// The action that was rejected
        action: String,
    },
}

impl DispatchError {
    /// Check if this error indicates an action outside the supported set.
    pub fn is_unsupported_action(&self) -> bool {
        matches!(self, DispatchError::UnsupportedAction { .. })
    }

    /// Get the offending action name, if the error names one.
    pub fn action(&self) -> Option<&str> {
        match self {
            DispatchError::UnsupportedAction { action }
            | DispatchError::MissingIdentifier { action }
            | DispatchError::ReadOnlyHandler { action } => Some(action),
            DispatchError::MissingMoveTarget { .. } => None,
        }
    }
}
