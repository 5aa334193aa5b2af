//! Hierarchy error types for the tree engine.

use thiserror::Error;

/// Errors that can occur while building or traversing a hierarchy.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum TreeError {
    /// No node with the given identifier exists in the hierarchy.
    #[error("Node not found in hierarchy: {id}")]
    NodeNotFound {
        /// The identifier that was looked up
        id: String,
    },

    /// A record's parent chain loops back onto itself, so the collection
    /// cannot be shaped into a tree.
    #[error("Cyclic parent reference detected at record: {id}")]
    CycleDetected {
        /// The identifier of a record on the cycle
        id: String,
    },

    /// A collection entry is not a record (object) and cannot be indexed.
    #[error("Collection entry at position {position} is not a record")]
    InvalidRecord {
        /// The entry's position in the input collection
        position: usize,
    },
}

impl TreeError {
    /// Check if this error indicates a node was not found.
    pub fn is_not_found(&self) -> bool {
        matches!(self, TreeError::NodeNotFound { .. })
    }

    /// Check if this error indicates the input violated the acyclicity
    /// precondition.
    pub fn is_cycle(&self) -> bool {
        matches!(self, TreeError::CycleDetected { .. })
    }
}
