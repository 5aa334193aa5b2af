//! Storage-collaborator boundary.
//!
//! The adapter never persists data itself; every physical operation goes
//! through an externally supplied [`DataModel`]. The trait mirrors the
//! logical action set one-to-one and receives an ephemeral
//! [`CollectionState`] describing the request context (handling mode,
//! resolved id/order fields, parsed filter).
//!
//! All calls are asynchronous; the dispatcher suspends on each and sequences
//! dependent calls within a request. No timeouts are imposed at this layer.
//!
//! [`InMemory`] provides a lock-protected in-process implementation used by
//! the test suite and for development wiring.

use async_trait::async_trait;
use serde_json::Value;

use crate::{Result, filter::Filter};

mod errors;
pub use errors::ModelError;

mod in_memory;
pub use in_memory::InMemory;

/// Ephemeral per-request context handed to every storage call.
///
/// Created per request by the dispatcher, never persisted, discarded after
/// the action completes.
#[derive(Debug, Clone, Default)]
pub struct CollectionState {
    /// The configured follow-on handling mode, if any.
    pub handling: Option<String>,
    /// The resolved identifier field name.
    pub field_id: Option<String>,
    /// The resolved order field name; only set when the order anchor is
    /// covered by the vocabulary.
    pub field_order: Option<String>,
    /// The parsed read filter, already translated server-ward.
    pub filter: Option<Filter>,
}

/// Asynchronous storage collaborator consumed by the dispatcher.
///
/// Implementations own persistence, filtering, and timeout policy. Failures
/// are reported as [`ModelError`] values (or any other [`crate::Error`]);
/// the dispatcher converts them to error envelopes at its boundary.
#[async_trait]
pub trait DataModel: Send + Sync {
    /// Reads the collection.
    async fn get_data(&self, state: &CollectionState) -> Result<Vec<Value>>;

    /// Inserts a record and returns the stored form, including any
    /// storage-assigned identifier.
    async fn insert_data(&self, record: Value, state: &CollectionState) -> Result<Value>;

    /// Updates the identified record with the given fields and returns the
    /// stored form.
    async fn update_data(&self, id: &str, record: Value, state: &CollectionState)
    -> Result<Value>;

    /// Replaces the identified record's body and returns the stored form.
    async fn replace_data(&self, id: &str, record: Value, state: &CollectionState)
    -> Result<Value>;

    /// Removes the identified record.
    async fn remove_data(&self, id: &str, state: &CollectionState) -> Result<()>;

    /// Reorders the identified record relative to the target identifier.
    async fn change_order_data(
        &self,
        id: &str,
        target_id: &str,
        state: &CollectionState,
    ) -> Result<Value>;

    /// Connection wiring hook; implementations that need no wiring keep the
    /// default no-op.
    async fn set_db(&self, _db: Value) -> Result<()> {
        Ok(())
    }

    /// Counterpart of [`DataModel::set_db`]: the current connection handle,
    /// `Null` when the implementation carries none.
    async fn get_db(&self) -> Result<Value> {
        Ok(Value::Null)
    }
}
