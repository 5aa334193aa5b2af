//! Action dispatch.
//!
//! The dispatcher is a single-transition state machine over the logical
//! action set: it extracts the request identifier, maps the payload
//! server-ward, selects the matching storage operation, and wraps every
//! outcome — success or failure — in a status-discriminated [`Envelope`].
//! No error crosses this boundary as a raw fault; storage failures and
//! unsupported actions alike surface as `{status: "error"}` envelopes.
//!
//! Deleting from a tree-shaped collection cascades: the full collection is
//! read, the branch of the target node is materialized, and one removal is
//! issued per branch element. The removals run concurrently with no mutual
//! ordering and are joined fail-fast. The first failure fails the whole
//! cascade; removals already issued are neither cancelled nor compensated.
//! That atomicity gap is a deliberate contract of this layer — compensation
//! belongs to a storage collaborator that can provide it transactionally.

use std::{str::FromStr, sync::Arc};

use futures::future::{BoxFuture, try_join_all};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::{
    Error, Result,
    constants::{ACTION_FIELD, DATA_FIELD, FILTER_FIELD, MOVE_TARGET_FIELD, ROOT_TREE_ID},
    filter::Filter,
    mapping::{Anchor, Direction, FieldMap},
    model::{CollectionState, DataModel},
    tree::{Tree, TreeFields, id_key},
};

mod errors;
pub use errors::DispatchError;

#[cfg(test)]
mod tests;

/// The supported logical actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Insert,
    Update,
    Replace,
    Move,
    Delete,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Insert => "insert",
            Action::Update => "update",
            Action::Replace => "replace",
            Action::Move => "move",
            Action::Delete => "delete",
        }
    }
}

impl FromStr for Action {
    type Err = DispatchError;

    fn from_str(action: &str) -> std::result::Result<Self, DispatchError> {
        match action {
            "read" => Ok(Action::Read),
            "insert" => Ok(Action::Insert),
            "update" => Ok(Action::Update),
            "replace" => Ok(Action::Replace),
            "move" => Ok(Action::Move),
            "delete" => Ok(Action::Delete),
            other => Err(DispatchError::UnsupportedAction {
                action: other.to_string(),
            }),
        }
    }
}

/// Shape of the collection the adapter serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataType {
    /// A flat record list.
    #[default]
    Default,
    /// A parent-referencing hierarchy.
    Tree,
}

/// How tree collections are materialized on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadingType {
    /// The full hierarchy in one pass.
    #[default]
    Static,
    /// One level per request, deeper levels deferred.
    Dynamic,
}

/// Uniform result envelope returned to the transport for every request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Envelope {
    Read {
        data: Value,
    },
    Inserted {
        source_id: String,
        target_id: String,
    },
    Updated {
        source_id: String,
        target_id: String,
    },
    Moved {
        source_id: String,
        target_id: String,
    },
    Deleted {
        source_id: String,
        target_id: String,
    },
    Error {
        error: String,
    },
}

impl Envelope {
    /// Folds a dispatch-boundary failure into an error envelope.
    pub fn from_error(error: &Error) -> Self {
        Envelope::Error {
            error: error.to_string(),
        }
    }
}

/// Decoded request state: the raw action, the extracted identifier, and the
/// identifier-stripped body.
#[derive(Debug, Clone)]
pub struct RequestState {
    /// The raw action string; validated against [`Action`] at dispatch.
    pub action: String,
    /// The request identifier, read through the id anchor.
    pub id: Option<String>,
    /// The record body, with the identifier and action stripped.
    pub data: Value,
    /// The raw filter block, if the request carried one.
    pub filter: Option<Value>,
}

impl RequestState {
    /// Decodes a payload.
    ///
    /// The identifier is read from the body through the id anchor and then
    /// stripped from it, so the stored record never duplicates its own key.
    pub fn from_payload(payload: Value, map: &FieldMap) -> Self {
        let mut payload = match payload {
            Value::Object(fields) => fields,
            _ => Map::new(),
        };
        let action = payload
            .get(ACTION_FIELD)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let filter = payload.shift_remove(FILTER_FIELD);
        let mut data = payload
            .shift_remove(DATA_FIELD)
            .unwrap_or(Value::Object(Map::new()));

        let id = map
            .field_data_by_anchor(&data, Anchor::Id)
            .and_then(id_key);
        map.delete_field_data_by_anchor(&mut data, Anchor::Id);

        Self {
            action,
            id,
            data,
            filter,
        }
    }
}

/// Maps a decoded request onto the storage collaborator.
///
/// Stateless between requests; all configuration is immutable for the
/// adapter's lifetime.
#[derive(Clone)]
pub struct Dispatcher {
    model: Arc<dyn DataModel>,
    map: FieldMap,
    data_type: DataType,
    loading: LoadingType,
}

impl Dispatcher {
    pub fn new(
        model: Arc<dyn DataModel>,
        map: FieldMap,
        data_type: DataType,
        loading: LoadingType,
    ) -> Self {
        Self {
            model,
            map,
            data_type,
            loading,
        }
    }

    /// The adapter's field map.
    pub fn map(&self) -> &FieldMap {
        &self.map
    }

    /// Processes one decoded request, folding every failure into an error
    /// envelope.
    pub async fn process(&self, state: RequestState, handling: Option<String>) -> Envelope {
        tracing::debug!(action = %state.action, id = ?state.id, "dispatching request");
        match self.dispatch(state, handling).await {
            Ok(envelope) => envelope,
            Err(error) => {
                tracing::warn!(%error, "request failed at dispatch boundary");
                Envelope::from_error(&error)
            }
        }
    }

    async fn dispatch(&self, state: RequestState, handling: Option<String>) -> Result<Envelope> {
        let action: Action = state.action.parse()?;
        let collection = self.collection_state(&state, handling);

        match action {
            Action::Read => self.read(&state, &collection).await,
            Action::Insert => self.insert(&state, &collection).await,
            Action::Update => self.update(action, &state, &collection).await,
            Action::Replace => self.update(action, &state, &collection).await,
            Action::Move => self.move_record(&state, &collection).await,
            Action::Delete => self.delete(&state, &collection).await,
        }
    }

    fn collection_state(&self, state: &RequestState, handling: Option<String>) -> CollectionState {
        let filter = state
            .filter
            .as_ref()
            .map(|block| Filter::parse(block).map_fields(&self.map));
        CollectionState {
            handling,
            field_id: self.map.field_by_anchor(Anchor::Id).map(str::to_string),
            field_order: self
                .map
                .is_anchor_mapped(Anchor::Order)
                .then(|| self.map.field_by_anchor(Anchor::Order).map(str::to_string))
                .flatten(),
            filter,
        }
    }

    async fn read(&self, state: &RequestState, collection: &CollectionState) -> Result<Envelope> {
        let records = self.model.get_data(collection).await?;
        let data = match self.data_type {
            DataType::Default => Value::Array(records),
            DataType::Tree => {
                let tree = Tree::build(&records, TreeFields::from_anchors(&self.map))?;
                match self.loading {
                    LoadingType::Static => tree.root(),
                    LoadingType::Dynamic => tree.item_children(&self.expansion_id(state)?),
                }
            }
        };
        Ok(Envelope::Read {
            data: self.map.map_record(&data, Direction::ToClient),
        })
    }

    /// The node a dynamic read expands.
    ///
    /// When the tree-selection anchor targets the same field as the
    /// parent-id anchor, the request identifier is a parent reference and an
    /// absent identifier means the top level. Otherwise the identifier names
    /// the node itself and must be present.
    fn expansion_id(&self, state: &RequestState) -> Result<String> {
        let selection_by_parent = self.map.anchor_target(Anchor::TreeSelection)
            == self.map.anchor_target(Anchor::ParentId);
        match (&state.id, selection_by_parent) {
            (Some(id), _) => Ok(id.clone()),
            (None, true) => Ok(ROOT_TREE_ID.to_string()),
            (None, false) => Err(DispatchError::MissingIdentifier {
                action: Action::Read.as_str().to_string(),
            }
            .into()),
        }
    }

    async fn insert(&self, state: &RequestState, collection: &CollectionState) -> Result<Envelope> {
        let body = self.map.map_record(&state.data, Direction::ToServer);
        let stored = self.model.insert_data(body, collection).await?;
        let source_id = state.id.clone().unwrap_or_default();
        Ok(Envelope::Inserted {
            target_id: self.stored_id(&stored).unwrap_or_else(|| source_id.clone()),
            source_id,
        })
    }

    async fn update(
        &self,
        action: Action,
        state: &RequestState,
        collection: &CollectionState,
    ) -> Result<Envelope> {
        let id = require_id(action, state)?;
        let body = self.map.map_record(&state.data, Direction::ToServer);
        let stored = match action {
            Action::Replace => self.model.replace_data(&id, body, collection).await?,
            _ => self.model.update_data(&id, body, collection).await?,
        };
        Ok(Envelope::Updated {
            target_id: self.stored_id(&stored).unwrap_or_else(|| id.clone()),
            source_id: id,
        })
    }

    async fn move_record(
        &self,
        state: &RequestState,
        collection: &CollectionState,
    ) -> Result<Envelope> {
        let id = require_id(Action::Move, state)?;
        let target = state
            .data
            .get(MOVE_TARGET_FIELD)
            .and_then(id_key)
            .ok_or_else(|| DispatchError::MissingMoveTarget { id: id.clone() })?;
        self.model
            .change_order_data(&id, &target, collection)
            .await?;
        // target_id echoes the request id, not the move target.
        Ok(Envelope::Moved {
            source_id: id.clone(),
            target_id: id,
        })
    }

    async fn delete(&self, state: &RequestState, collection: &CollectionState) -> Result<Envelope> {
        let id = require_id(Action::Delete, state)?;
        match self.data_type {
            DataType::Default => self.model.remove_data(&id, collection).await?,
            DataType::Tree => {
                let records = self.model.get_data(collection).await?;
                let fields = TreeFields::from_anchors(&self.map);
                let tree = Tree::build(&records, fields)?;
                let branch = tree.branch_elements(&id)?;

                let ids: Vec<String> = branch
                    .iter()
                    .filter_map(|node| node.get(&tree.fields().id).and_then(id_key))
                    .collect();
                tracing::debug!(root = %id, elements = ids.len(), "cascading branch delete");

                // Fan out one removal per branch element and join fail-fast.
                // A failed removal fails the cascade; removals already in
                // flight are not cancelled or compensated.
                let removals = ids
                    .iter()
                    .map(|element| self.model.remove_data(element, collection));
                try_join_all(removals).await?;
            }
        }
        Ok(Envelope::Deleted {
            source_id: id.clone(),
            target_id: id,
        })
    }

    /// The storage-assigned identifier of a stored record, if any.
    fn stored_id(&self, stored: &Value) -> Option<String> {
        self.map
            .field_data_by_anchor(stored, Anchor::Id)
            .and_then(id_key)
    }
}

fn require_id(action: Action, state: &RequestState) -> Result<String> {
    state.id.clone().ok_or_else(|| {
        DispatchError::MissingIdentifier {
            action: action.as_str().to_string(),
        }
        .into()
    })
}

/// Which pipeline a request handler runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    /// Full CRUD pipeline.
    Crud,
    /// Read-only pipeline; mutating actions are rejected before dispatch.
    Data,
}

/// Outcome of a custom interception handler.
#[derive(Debug, Clone)]
pub enum Intercept {
    /// Use this data as the action's result or body and finish the pipeline.
    Final(Value),
    /// Proceed with the configured handling mode.
    Continue,
    /// Fail the request with the given reason.
    Fail(String),
}

/// Request context handed to a custom interception handler.
///
/// For CRUD handlers the body is already translated server-ward; read-only
/// handlers receive it verbatim.
#[derive(Debug, Clone)]
pub struct HandlerState {
    pub action: String,
    pub id: Option<String>,
    pub data: Value,
    pub handling: Option<String>,
}

/// A custom interception handler supplied by the embedder.
pub type CustomHandler =
    Arc<dyn Fn(HandlerState) -> BoxFuture<'static, Intercept> + Send + Sync>;

/// A bound request pipeline: everything the transport needs to turn one
/// decoded payload into an envelope.
#[derive(Clone)]
pub struct RequestHandler {
    kind: HandlerKind,
    handling: Option<String>,
    custom: Option<CustomHandler>,
    dispatcher: Dispatcher,
}

impl RequestHandler {
    pub(crate) fn new(
        kind: HandlerKind,
        handling: Option<String>,
        custom: Option<CustomHandler>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            kind,
            handling,
            custom,
            dispatcher,
        }
    }

    /// Runs one decoded payload through the pipeline.
    pub async fn handle(&self, payload: Value) -> Envelope {
        let mut state = RequestState::from_payload(payload, self.dispatcher.map());

        if self.kind == HandlerKind::Data && state.action != Action::Read.as_str() {
            let error: Error = DispatchError::ReadOnlyHandler {
                action: state.action.clone(),
            }
            .into();
            tracing::warn!(%error, "rejected mutating action on read-only handler");
            return Envelope::from_error(&error);
        }

        if let Some(custom) = &self.custom {
            let handler_state = HandlerState {
                action: state.action.clone(),
                id: state.id.clone(),
                data: match self.kind {
                    HandlerKind::Crud => self
                        .dispatcher
                        .map()
                        .map_record(&state.data, Direction::ToServer),
                    HandlerKind::Data => state.data.clone(),
                },
                handling: self.handling.clone(),
            };
            match custom(handler_state).await {
                Intercept::Fail(reason) => return Envelope::Error { error: reason },
                Intercept::Final(data) => {
                    if state.action == Action::Read.as_str() {
                        return Envelope::Read {
                            data: self.dispatcher.map().map_record(&data, Direction::ToClient),
                        };
                    }
                    state.data = data;
                }
                Intercept::Continue => {}
            }
        }

        self.dispatcher.process(state, self.handling.clone()).await
    }
}
