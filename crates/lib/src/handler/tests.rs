//! Tests for the action dispatcher.

use std::sync::{
    Mutex,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use serde_json::json;

use super::*;
use crate::model::{CollectionState, InMemory, ModelError};

/// Storage double that counts every call, records removals, and can be told
/// to fail the removal of one specific record.
#[derive(Default)]
struct Recording {
    inner: InMemory,
    calls: AtomicUsize,
    removals: Mutex<Vec<String>>,
    fail_remove_for: Option<String>,
}

impl Recording {
    async fn seeded(db: Value) -> Arc<Self> {
        let recording = Self::default();
        recording.inner.set_db(db).await.unwrap();
        Arc::new(recording)
    }

    async fn failing_removal_of(db: Value, id: &str) -> Arc<Self> {
        let mut recording = Self::default();
        recording.fail_remove_for = Some(id.to_string());
        recording.inner.set_db(db).await.unwrap();
        Arc::new(recording)
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn removed(&self) -> Vec<String> {
        self.removals.lock().unwrap().clone()
    }
}

#[async_trait]
impl DataModel for Recording {
    async fn get_data(&self, state: &CollectionState) -> Result<Vec<Value>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.get_data(state).await
    }

    async fn insert_data(&self, record: Value, state: &CollectionState) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.insert_data(record, state).await
    }

    async fn update_data(
        &self,
        id: &str,
        record: Value,
        state: &CollectionState,
    ) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.update_data(id, record, state).await
    }

    async fn replace_data(
        &self,
        id: &str,
        record: Value,
        state: &CollectionState,
    ) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.replace_data(id, record, state).await
    }

    async fn remove_data(&self, id: &str, state: &CollectionState) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.removals.lock().unwrap().push(id.to_string());
        if self.fail_remove_for.as_deref() == Some(id) {
            return Err(ModelError::Backend {
                operation: "remove_data".to_string(),
                reason: format!("injected failure for '{id}'"),
            }
            .into());
        }
        self.inner.remove_data(id, state).await
    }

    async fn change_order_data(
        &self,
        id: &str,
        target_id: &str,
        state: &CollectionState,
    ) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.change_order_data(id, target_id, state).await
    }
}

/// Routes dispatcher logs through the test harness; honors `RUST_LOG`.
fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn flat_dispatcher(model: Arc<dyn DataModel>, map: FieldMap) -> Dispatcher {
    Dispatcher::new(model, map, DataType::Default, LoadingType::Static)
}

fn tree_map() -> FieldMap {
    FieldMap::new().with_anchor(Anchor::ParentId, "parent")
}

fn tree_db() -> Value {
    json!([
        {"id": 1, "parent": 0},
        {"id": 2, "parent": 1},
        {"id": 3, "parent": 1}
    ])
}

fn request(dispatcher: &Dispatcher, payload: Value) -> RequestState {
    RequestState::from_payload(payload, dispatcher.map())
}

#[test]
fn test_request_state_extracts_and_strips_identifier() {
    let map = FieldMap::new().with_anchor(Anchor::Id, "item_id");
    let payload = json!({
        "action": "update",
        "data": {"item_id": 5, "title": "A"}
    });

    let state = RequestState::from_payload(payload, &map);

    assert_eq!(state.action, "update");
    assert_eq!(state.id.as_deref(), Some("5"));
    assert_eq!(state.data, json!({"title": "A"}));
}

#[tokio::test]
async fn test_read_flat_maps_records_client_ward() {
    let model = Recording::seeded(json!([{"id": 1, "t_title": "A"}])).await;
    let map = FieldMap::new()
        .with_vocabulary([("title", "t_title")], false)
        .unwrap();
    let dispatcher = flat_dispatcher(model, map);

    let state = request(&dispatcher, json!({"action": "read"}));
    let envelope = dispatcher.process(state, None).await;

    assert_eq!(
        envelope,
        Envelope::Read {
            data: json!([{"id": 1, "title": "A"}])
        }
    );
}

#[tokio::test]
async fn test_read_static_tree_shape() {
    let model = Recording::seeded(tree_db()).await;
    let dispatcher = Dispatcher::new(model, tree_map(), DataType::Tree, LoadingType::Static);

    let state = request(&dispatcher, json!({"action": "read"}));
    let envelope = dispatcher.process(state, None).await;

    let Envelope::Read { data } = envelope else {
        panic!("expected read envelope");
    };
    // The bound parent anchor renames "parent" to its logical key on the
    // way out.
    assert_eq!(data["parent_id"], json!(0));
    let roots = data["data"].as_array().unwrap();
    assert_eq!(roots.len(), 1);
    let children = roots[0]["data"].as_array().unwrap();
    assert_eq!(children.len(), 2);
    assert_eq!(children[0]["id"], json!(2));
    assert_eq!(children[0]["parent_id"], json!(1));
}

#[tokio::test]
async fn test_read_dynamic_tree_top_level() {
    let model = Recording::seeded(tree_db()).await;
    let map = tree_map()
        .with_anchor(Anchor::TreeSelection, "parent")
        .with_anchor(Anchor::NodeHasChildren, "has_children");
    let dispatcher = Dispatcher::new(model, map, DataType::Tree, LoadingType::Dynamic);

    // No identifier and selection by parent: the top level is requested.
    let state = request(&dispatcher, json!({"action": "read"}));
    let envelope = dispatcher.process(state, None).await;

    let Envelope::Read { data } = envelope else {
        panic!("expected read envelope");
    };
    let children = data["data"].as_array().unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0]["id"], json!(1));
    // Node 1 has descendants: marked, not embedded.
    assert_eq!(children[0]["has_children"], json!(true));
    assert!(children[0].get("data").is_none());
}

#[tokio::test]
async fn test_read_dynamic_tree_expansion_level() {
    let model = Recording::seeded(tree_db()).await;
    let map = tree_map()
        .with_anchor(Anchor::TreeSelection, "parent")
        .with_anchor(Anchor::NodeHasChildren, "has_children");
    let dispatcher = Dispatcher::new(model, map, DataType::Tree, LoadingType::Dynamic);

    let state = request(&dispatcher, json!({"action": "read", "data": {"id": 1}}));
    let envelope = dispatcher.process(state, None).await;

    let Envelope::Read { data } = envelope else {
        panic!("expected read envelope");
    };
    let children = data["data"].as_array().unwrap();
    let ids: Vec<&Value> = children.iter().map(|child| &child["id"]).collect();
    assert_eq!(ids, [&json!(2), &json!(3)]);
}

#[tokio::test]
async fn test_insert_reports_storage_assigned_id() {
    let model = Recording::seeded(json!([])).await;
    let map = FieldMap::new()
        .with_vocabulary([("title", "t_title")], false)
        .unwrap();
    let dispatcher = flat_dispatcher(model.clone(), map);

    let state = request(
        &dispatcher,
        json!({"action": "insert", "data": {"title": "A"}}),
    );
    let envelope = dispatcher.process(state, None).await;

    assert_eq!(
        envelope,
        Envelope::Inserted {
            source_id: String::new(),
            target_id: "1".to_string(),
        }
    );
    // The stored body carries the server vocabulary.
    let stored = model.inner.get_data(&CollectionState::default()).await.unwrap();
    assert_eq!(stored[0]["t_title"], json!("A"));
}

/// Storage stub that accepts inserts without assigning an identifier.
struct NoAssignModel;

#[async_trait]
impl DataModel for NoAssignModel {
    async fn get_data(&self, _state: &CollectionState) -> Result<Vec<Value>> {
        Ok(Vec::new())
    }

    async fn insert_data(&self, record: Value, _state: &CollectionState) -> Result<Value> {
        Ok(record)
    }

    async fn update_data(
        &self,
        _id: &str,
        record: Value,
        _state: &CollectionState,
    ) -> Result<Value> {
        Ok(record)
    }

    async fn replace_data(
        &self,
        _id: &str,
        record: Value,
        _state: &CollectionState,
    ) -> Result<Value> {
        Ok(record)
    }

    async fn remove_data(&self, _id: &str, _state: &CollectionState) -> Result<()> {
        Ok(())
    }

    async fn change_order_data(
        &self,
        _id: &str,
        _target_id: &str,
        _state: &CollectionState,
    ) -> Result<Value> {
        Ok(Value::Null)
    }
}

#[tokio::test]
async fn test_insert_echoes_request_id_when_storage_assigns_none() {
    let dispatcher = flat_dispatcher(Arc::new(NoAssignModel), FieldMap::new());

    let state = request(
        &dispatcher,
        json!({"action": "insert", "data": {"id": 42, "title": "A"}}),
    );
    let envelope = dispatcher.process(state, None).await;

    // The identifier was stripped from the body and storage assigned none,
    // so the envelope falls back to the request id.
    assert_eq!(
        envelope,
        Envelope::Inserted {
            source_id: "42".to_string(),
            target_id: "42".to_string(),
        }
    );
}

#[tokio::test]
async fn test_update_and_replace_report_updated() {
    let model = Recording::seeded(json!([{"id": 1, "title": "old", "note": "kept"}])).await;
    let dispatcher = flat_dispatcher(model, FieldMap::new());

    let update = request(
        &dispatcher,
        json!({"action": "update", "data": {"id": 1, "title": "new"}}),
    );
    assert_eq!(
        dispatcher.process(update, None).await,
        Envelope::Updated {
            source_id: "1".to_string(),
            target_id: "1".to_string(),
        }
    );

    let replace = request(
        &dispatcher,
        json!({"action": "replace", "data": {"id": 1, "title": "only"}}),
    );
    assert_eq!(
        dispatcher.process(replace, None).await,
        Envelope::Updated {
            source_id: "1".to_string(),
            target_id: "1".to_string(),
        }
    );
}

#[tokio::test]
async fn test_update_without_identifier_fails() {
    let model = Recording::seeded(json!([])).await;
    let dispatcher = flat_dispatcher(model.clone(), FieldMap::new());

    let state = request(&dispatcher, json!({"action": "update", "data": {"x": 1}}));
    let envelope = dispatcher.process(state, None).await;

    let Envelope::Error { error } = envelope else {
        panic!("expected error envelope");
    };
    assert!(error.contains("requires a record identifier"));
    assert_eq!(model.call_count(), 0);
}

#[tokio::test]
async fn test_move_echoes_request_id_as_target() {
    let model = Recording::seeded(json!([{"id": 1}, {"id": 2}, {"id": 3}])).await;
    let dispatcher = flat_dispatcher(model.clone(), FieldMap::new());

    let state = request(
        &dispatcher,
        json!({"action": "move", "data": {"id": 3, "move_id": 1}}),
    );
    let envelope = dispatcher.process(state, None).await;

    assert_eq!(
        envelope,
        Envelope::Moved {
            source_id: "3".to_string(),
            target_id: "3".to_string(),
        }
    );
    let order: Vec<Value> = model
        .inner
        .get_data(&CollectionState::default())
        .await
        .unwrap()
        .iter()
        .map(|record| record["id"].clone())
        .collect();
    assert_eq!(order, [json!(3), json!(1), json!(2)]);
}

#[tokio::test]
async fn test_delete_flat_issues_single_removal() {
    let model = Recording::seeded(json!([{"id": 1}, {"id": 2}])).await;
    let dispatcher = flat_dispatcher(model.clone(), FieldMap::new());

    let state = request(&dispatcher, json!({"action": "delete", "data": {"id": 2}}));
    let envelope = dispatcher.process(state, None).await;

    assert_eq!(
        envelope,
        Envelope::Deleted {
            source_id: "2".to_string(),
            target_id: "2".to_string(),
        }
    );
    assert_eq!(model.removed(), ["2"]);
}

#[tokio::test]
async fn test_delete_tree_cascades_over_branch() {
    init_logging();
    let model = Recording::seeded(tree_db()).await;
    let dispatcher = Dispatcher::new(
        model.clone(),
        tree_map(),
        DataType::Tree,
        LoadingType::Static,
    );

    let state = request(&dispatcher, json!({"action": "delete", "data": {"id": 1}}));
    let envelope = dispatcher.process(state, None).await;

    assert_eq!(
        envelope,
        Envelope::Deleted {
            source_id: "1".to_string(),
            target_id: "1".to_string(),
        }
    );
    let mut removed = model.removed();
    removed.sort();
    assert_eq!(removed, ["1", "2", "3"]);
}

#[tokio::test]
async fn test_delete_tree_fails_fast_on_partial_failure() {
    init_logging();
    let model = Recording::failing_removal_of(tree_db(), "3").await;
    let dispatcher = Dispatcher::new(
        model.clone(),
        tree_map(),
        DataType::Tree,
        LoadingType::Static,
    );

    let state = request(&dispatcher, json!({"action": "delete", "data": {"id": 1}}));
    let envelope = dispatcher.process(state, None).await;

    let Envelope::Error { error } = envelope else {
        panic!("expected error envelope");
    };
    assert!(error.contains("injected failure"));
    // The cascade was issued for the failing element; siblings that
    // succeeded are not rolled back.
    assert!(model.removed().contains(&"3".to_string()));
}

#[tokio::test]
async fn test_unsupported_action_never_reaches_storage() {
    let model = Recording::seeded(json!([{"id": 1}])).await;
    let dispatcher = flat_dispatcher(model.clone(), FieldMap::new());

    let state = request(&dispatcher, json!({"action": "archive", "data": {"id": 1}}));
    let envelope = dispatcher.process(state, None).await;

    let Envelope::Error { error } = envelope else {
        panic!("expected error envelope");
    };
    assert!(error.contains("archive"));
    assert_eq!(model.call_count(), 0);
}

#[tokio::test]
async fn test_read_passes_mapped_filter_to_storage() {
    let model = Recording::seeded(json!([{"id": 1}, {"id": 2}, {"id": 3}])).await;
    let dispatcher = flat_dispatcher(model, FieldMap::new());

    let state = request(
        &dispatcher,
        json!({"action": "read", "filter": {"limit": {"from": 0, "count": 2}}}),
    );
    let envelope = dispatcher.process(state, None).await;

    let Envelope::Read { data } = envelope else {
        panic!("expected read envelope");
    };
    assert_eq!(data.as_array().unwrap().len(), 2);
}

#[test]
fn test_envelope_serializes_with_status_discriminator() {
    let envelope = Envelope::Deleted {
        source_id: "1".to_string(),
        target_id: "1".to_string(),
    };

    assert_eq!(
        serde_json::to_value(&envelope).unwrap(),
        json!({"status": "deleted", "source_id": "1", "target_id": "1"})
    );

    let error = Envelope::Error {
        error: "boom".to_string(),
    };
    assert_eq!(
        serde_json::to_value(&error).unwrap(),
        json!({"status": "error", "error": "boom"})
    );
}
