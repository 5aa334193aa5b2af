//!
//! Dataport: a request-to-storage adapter.
//!
//! Dataport sits between a request transport and a storage collaborator. It
//! accepts a logical CRUD action together with a payload expressed in a
//! "client" field vocabulary, translates the payload into the "server"
//! vocabulary, optionally reshapes flat record sets into hierarchical (tree)
//! structures, invokes the storage collaborator, and translates the result
//! back to the client vocabulary.
//!
//! ## Core Concepts
//!
//! * **Records**: schemaless, order-preserving JSON objects
//!   (`serde_json::Value`), addressed by field name or by logical anchor.
//! * **Field Mapping (`mapping::FieldMap`)**: the bidirectional client/server
//!   vocabulary plus anchor-based logical-role indirection (id, parent
//!   reference, order, ...).
//! * **Trees (`tree::Tree`)**: flat parent-referencing record sets built into
//!   full (static) trees or single-level (dynamic) views, plus the pre-order
//!   branch traversal that drives cascading deletes.
//! * **Dispatch (`handler::Dispatcher`)**: maps a decoded action onto the
//!   storage collaborator and wraps every outcome in a uniform
//!   status-discriminated envelope.
//! * **Controller (`controller::Controller`)**: the adapter surface. A
//!   controller is an immutable configuration value; `map()`, `tree()` and
//!   `tree_dynamic()` derive new controllers instead of mutating shared state.
//! * **Collaborators**: the storage backend (`model::DataModel`) and the
//!   request transport (`transport::Transport`) are supplied by the embedder
//!   and only specified at their boundary.

pub mod constants;
pub mod controller;
pub mod events;
pub mod filter;
pub mod handler;
pub mod mapping;
pub mod model;
pub mod transport;
pub mod tree;

/// Re-export of the adapter surface for easier access.
pub use controller::Controller;

/// Result type used throughout the Dataport library.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the Dataport library.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Structured field-mapping errors from the mapping module
    #[error(transparent)]
    Mapping(#[from] mapping::MappingError),

    /// Structured hierarchy errors from the tree module
    #[error(transparent)]
    Tree(#[from] tree::TreeError),

    /// Structured storage-collaborator errors from the model module
    #[error(transparent)]
    Model(#[from] model::ModelError),

    /// Structured dispatch errors from the handler module
    #[error(transparent)]
    Dispatch(#[from] handler::DispatchError),

    /// Structured transport-boundary errors from the transport module
    #[error(transparent)]
    Transport(#[from] transport::TransportError),
}

impl Error {
    /// Get the originating module for this error.
    pub fn module(&self) -> &'static str {
        match self {
            Error::Serialize(_) => "serialize",
            Error::Mapping(_) => "mapping",
            Error::Tree(_) => "tree",
            Error::Model(_) => "model",
            Error::Dispatch(_) => "handler",
            Error::Transport(_) => "transport",
        }
    }

    /// Check if this error indicates a record or node was not found.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Tree(tree_err) => tree_err.is_not_found(),
            Error::Model(model_err) => model_err.is_not_found(),
            _ => false,
        }
    }

    /// Check if this error indicates an action outside the supported set.
    pub fn is_unsupported_action(&self) -> bool {
        match self {
            Error::Dispatch(dispatch_err) => dispatch_err.is_unsupported_action(),
            _ => false,
        }
    }

    /// Check if this error indicates an invalid adapter configuration.
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Error::Mapping(_))
    }
}
