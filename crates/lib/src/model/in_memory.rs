//! In-memory storage model.
//!
//! This module provides an in-process implementation of the [`DataModel`]
//! trait, suitable for testing, development, or scenarios where the record
//! set lives entirely in memory and persistence is handled externally.

use async_trait::async_trait;
use serde_json::{Number, Value};
use tokio::sync::RwLock;

use crate::{
    Result,
    constants::DEFAULT_ID_FIELD,
    model::{CollectionState, DataModel, ModelError},
    tree::id_key,
};

/// A simple in-memory model keeping records in an ordered list behind a
/// read-write lock.
///
/// Records are identified by their `id` field. Inserted records without an
/// identifier are assigned the next free integer id, mimicking a
/// storage-assigned primary key. `set_db` seeds the collection from a JSON
/// array, which is how tests and examples wire their fixtures.
#[derive(Debug, Default)]
pub struct InMemory {
    records: RwLock<Vec<Value>>,
}

impl InMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Position of the record carrying the given identifier.
    fn position(records: &[Value], id: &str) -> Option<usize> {
        records.iter().position(|record| {
            record
                .get(DEFAULT_ID_FIELD)
                .and_then(id_key)
                .is_some_and(|key| key == id)
        })
    }

    /// Next free integer identifier.
    fn next_id(records: &[Value]) -> u64 {
        records
            .iter()
            .filter_map(|record| record.get(DEFAULT_ID_FIELD).and_then(Value::as_u64))
            .max()
            .map_or(1, |max| max + 1)
    }
}

#[async_trait]
impl DataModel for InMemory {
    async fn get_data(&self, state: &CollectionState) -> Result<Vec<Value>> {
        let records = self.records.read().await;
        let mut data: Vec<Value> = records.clone();

        // Filtering beyond the result window is the embedder's concern; the
        // in-memory model only honors the limit.
        if let Some(filter) = &state.filter {
            let from = filter.limit.from.unwrap_or(0) as usize;
            data = data.into_iter().skip(from).collect();
            if let Some(count) = filter.limit.count {
                data.truncate(count as usize);
            }
        }
        Ok(data)
    }

    async fn insert_data(&self, record: Value, _state: &CollectionState) -> Result<Value> {
        if !record.is_object() {
            return Err(ModelError::InvalidRecord {
                reason: "insert payload is not an object".to_string(),
            }
            .into());
        }

        let mut records = self.records.write().await;
        let mut stored = record;
        let has_id = stored
            .get(DEFAULT_ID_FIELD)
            .and_then(id_key)
            .is_some();
        if !has_id && let Some(fields) = stored.as_object_mut() {
            let assigned = Self::next_id(&records);
            fields.insert(
                DEFAULT_ID_FIELD.to_string(),
                Value::Number(Number::from(assigned)),
            );
        }
        records.push(stored.clone());
        Ok(stored)
    }

    async fn update_data(
        &self,
        id: &str,
        record: Value,
        _state: &CollectionState,
    ) -> Result<Value> {
        let mut records = self.records.write().await;
        let position = Self::position(&records, id).ok_or_else(|| ModelError::RecordNotFound {
            id: id.to_string(),
        })?;

        if let Some(fields) = record.as_object()
            && let Some(stored) = records[position].as_object_mut()
        {
            for (key, value) in fields {
                stored.insert(key.clone(), value.clone());
            }
        }
        Ok(records[position].clone())
    }

    async fn replace_data(
        &self,
        id: &str,
        record: Value,
        _state: &CollectionState,
    ) -> Result<Value> {
        let mut records = self.records.write().await;
        let position = Self::position(&records, id).ok_or_else(|| ModelError::RecordNotFound {
            id: id.to_string(),
        })?;

        let preserved = records[position].get(DEFAULT_ID_FIELD).cloned();
        let mut replacement = record;
        if let Some(id_value) = preserved
            && let Some(fields) = replacement.as_object_mut()
        {
            fields.insert(DEFAULT_ID_FIELD.to_string(), id_value);
        }
        records[position] = replacement;
        Ok(records[position].clone())
    }

    async fn remove_data(&self, id: &str, _state: &CollectionState) -> Result<()> {
        let mut records = self.records.write().await;
        let position = Self::position(&records, id).ok_or_else(|| ModelError::RecordNotFound {
            id: id.to_string(),
        })?;
        records.remove(position);
        Ok(())
    }

    async fn change_order_data(
        &self,
        id: &str,
        target_id: &str,
        _state: &CollectionState,
    ) -> Result<Value> {
        let mut records = self.records.write().await;
        let source = Self::position(&records, id).ok_or_else(|| ModelError::RecordNotFound {
            id: id.to_string(),
        })?;
        let moved = records.remove(source);
        let target =
            Self::position(&records, target_id).ok_or_else(|| ModelError::RecordNotFound {
                id: target_id.to_string(),
            })?;
        records.insert(target, moved.clone());
        Ok(moved)
    }

    async fn set_db(&self, db: Value) -> Result<()> {
        let seeded = match db {
            Value::Array(records) => records,
            Value::Null => Vec::new(),
            other => {
                return Err(ModelError::InvalidRecord {
                    reason: format!("in-memory db must be an array, got {other}"),
                }
                .into());
            }
        };
        *self.records.write().await = seeded;
        Ok(())
    }

    async fn get_db(&self) -> Result<Value> {
        Ok(Value::Array(self.records.read().await.clone()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn state() -> CollectionState {
        CollectionState::default()
    }

    #[tokio::test]
    async fn test_insert_assigns_next_free_id() -> Result<()> {
        let model = InMemory::new();
        model.set_db(json!([{"id": 4, "title": "seeded"}])).await?;

        let stored = model.insert_data(json!({"title": "new"}), &state()).await?;

        assert_eq!(stored["id"], json!(5));
        assert_eq!(model.get_data(&state()).await?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_update_merges_fields() -> Result<()> {
        let model = InMemory::new();
        model
            .set_db(json!([{"id": 1, "title": "old", "note": "kept"}]))
            .await?;

        let stored = model
            .update_data("1", json!({"title": "new"}), &state())
            .await?;

        assert_eq!(stored, json!({"id": 1, "title": "new", "note": "kept"}));
        Ok(())
    }

    #[tokio::test]
    async fn test_replace_keeps_identifier_only() -> Result<()> {
        let model = InMemory::new();
        model
            .set_db(json!([{"id": 1, "title": "old", "note": "dropped"}]))
            .await?;

        let stored = model
            .replace_data("1", json!({"title": "new"}), &state())
            .await?;

        assert_eq!(stored["id"], json!(1));
        assert_eq!(stored["title"], json!("new"));
        assert!(stored.get("note").is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_remove_missing_record_is_not_found() {
        let model = InMemory::new();

        let err = model
            .remove_data("9", &state())
            .await
            .expect_err("empty collection");
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_change_order_repositions_record() -> Result<()> {
        let model = InMemory::new();
        model
            .set_db(json!([{"id": 1}, {"id": 2}, {"id": 3}]))
            .await?;

        model.change_order_data("3", "1", &state()).await?;

        let ids: Vec<Value> = model
            .get_data(&state())
            .await?
            .iter()
            .map(|record| record["id"].clone())
            .collect();
        assert_eq!(ids, [json!(3), json!(1), json!(2)]);
        Ok(())
    }

    #[tokio::test]
    async fn test_get_db_returns_seeded_collection() -> Result<()> {
        let model = InMemory::new();
        model.set_db(json!([{"id": 1}])).await?;

        assert_eq!(model.get_db().await?, json!([{"id": 1}]));
        Ok(())
    }

    #[tokio::test]
    async fn test_get_data_honors_limit() -> Result<()> {
        let model = InMemory::new();
        model
            .set_db(json!([{"id": 1}, {"id": 2}, {"id": 3}, {"id": 4}]))
            .await?;

        let mut collection = state();
        collection.filter = Some(crate::filter::Filter::parse(
            &json!({"limit": {"from": 1, "count": 2}}),
        ));

        let data = model.get_data(&collection).await?;
        assert_eq!(data.len(), 2);
        assert_eq!(data[0]["id"], json!(2));
        Ok(())
    }
}
