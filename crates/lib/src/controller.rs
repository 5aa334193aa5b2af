//! The adapter surface.
//!
//! A [`Controller`] binds a storage model and a transport to an immutable
//! adapter configuration (vocabulary, anchors, collection shape, loading
//! mode) and manufactures bound request pipelines from it. Configuration
//! identity is copy-on-write: [`Controller::map`], [`Controller::tree`] and
//! [`Controller::tree_dynamic`] always derive a new controller and never
//! mutate the one they were called on, so concurrent requests can never
//! observe a half-reconfigured adapter.

use std::sync::Arc;

use serde_json::Value;

use crate::{
    Result,
    events::EventRegistry,
    handler::{
        CustomHandler, DataType, Dispatcher, HandlerKind, LoadingType, RequestHandler,
    },
    mapping::{Anchor, FieldMap},
    model::DataModel,
    transport::Transport,
};

/// Server field the parent role binds to in tree mode.
const TREE_PARENT_FIELD: &str = "parent";

/// Server field the has-children marker binds to in dynamic tree mode.
const TREE_HAS_CHILDREN_FIELD: &str = "has_children";

/// The adapter: storage model + transport + immutable configuration.
#[derive(Clone)]
pub struct Controller {
    model: Arc<dyn DataModel>,
    transport: Arc<dyn Transport>,
    events: Arc<EventRegistry>,
    map: FieldMap,
    data_type: DataType,
    loading: LoadingType,
}

impl Controller {
    /// Creates an adapter over a flat collection with an empty vocabulary
    /// and the default anchor bindings.
    pub fn new(model: Arc<dyn DataModel>, transport: Arc<dyn Transport>) -> Self {
        Self {
            model,
            transport,
            events: Arc::new(EventRegistry::new()),
            map: FieldMap::new(),
            data_type: DataType::Default,
            loading: LoadingType::Static,
        }
    }

    /// Derives a controller with a client → server vocabulary bound.
    ///
    /// # Errors
    /// Rejects vocabularies whose inverse is not injective
    /// ([`crate::mapping::MappingError::AmbiguousVocabulary`]).
    pub fn map<I, K, V>(&self, vocabulary: I, use_only_mapped_fields: bool) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut derived = self.clone();
        derived.map = self.map.with_vocabulary(vocabulary, use_only_mapped_fields)?;
        Ok(derived)
    }

    /// Derives a controller serving the collection as a static tree,
    /// binding the parent role to its server field.
    pub fn tree(&self) -> Self {
        let mut derived = self.clone();
        derived.map = self.map.with_anchor(Anchor::ParentId, TREE_PARENT_FIELD);
        derived.data_type = DataType::Tree;
        derived.loading = LoadingType::Static;
        derived
    }

    /// Derives a controller serving the collection as a dynamic (lazy)
    /// tree: one level per request, non-leaf nodes marked instead of
    /// embedded.
    pub fn tree_dynamic(&self) -> Self {
        let mut derived = self.clone();
        derived.map = self
            .map
            .with_anchor(Anchor::ParentId, TREE_PARENT_FIELD)
            .with_anchor(Anchor::TreeSelection, TREE_PARENT_FIELD)
            .with_anchor(Anchor::NodeHasChildren, TREE_HAS_CHILDREN_FIELD);
        derived.data_type = DataType::Tree;
        derived.loading = LoadingType::Dynamic;
        derived
    }

    /// A full CRUD pipeline bound to this configuration.
    pub fn crud(&self) -> RequestHandler {
        self.handler(HandlerKind::Crud, None, None)
    }

    /// A full CRUD pipeline with a handling mode and/or a custom
    /// interception handler.
    pub fn crud_with(
        &self,
        handling: Option<&str>,
        custom: Option<CustomHandler>,
    ) -> RequestHandler {
        self.handler(HandlerKind::Crud, handling, custom)
    }

    /// A read-only pipeline bound to this configuration; mutating actions
    /// are rejected before any storage call.
    pub fn data(&self) -> RequestHandler {
        self.handler(HandlerKind::Data, None, None)
    }

    /// A read-only pipeline with a handling mode and/or a custom
    /// interception handler.
    pub fn data_with(
        &self,
        handling: Option<&str>,
        custom: Option<CustomHandler>,
    ) -> RequestHandler {
        self.handler(HandlerKind::Data, handling, custom)
    }

    /// Forwards connection wiring to the storage model.
    pub async fn set_db(&self, db: Value) -> Result<()> {
        self.model.set_db(db).await
    }

    /// Hands one inbound request to the transport with the given pipeline.
    pub async fn process_request(&self, handler: &RequestHandler) -> Result<()> {
        self.transport.process_request(handler).await
    }

    /// The adapter's field map.
    pub fn field_map(&self) -> &FieldMap {
        &self.map
    }

    /// The adapter's observer registry.
    pub fn events(&self) -> &EventRegistry {
        &self.events
    }

    fn handler(
        &self,
        kind: HandlerKind,
        handling: Option<&str>,
        custom: Option<CustomHandler>,
    ) -> RequestHandler {
        let dispatcher = Dispatcher::new(
            self.model.clone(),
            self.map.clone(),
            self.data_type,
            self.loading,
        );
        RequestHandler::new(kind, handling.map(str::to_string), custom, dispatcher)
    }
}
