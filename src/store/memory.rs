//! In-memory entity store adapter.
//!
//! Backs development mode and the test suites. Mirrors the managed
//! platform's observable behavior: server-assigned ids and creation
//! timestamps, equality-only filters, and idempotent deletes.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use super::{EntityKind, EntityStore, Filter, Record, StoreError};

#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<EntityKind, HashMap<String, Record>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held for a kind. Test helper.
    pub fn count(&self, kind: EntityKind) -> usize {
        self.collections
            .read()
            .unwrap()
            .get(&kind)
            .map(|c| c.len())
            .unwrap_or(0)
    }
}

fn record_id(record: &Record) -> Option<String> {
    record.get("id").and_then(|v| v.as_str()).map(String::from)
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn list(&self, kind: EntityKind, sort: Option<&str>) -> Result<Vec<Record>, StoreError> {
        let collections = self.collections.read().unwrap();
        let mut records: Vec<Record> = collections
            .get(&kind)
            .map(|c| c.values().cloned().collect())
            .unwrap_or_default();

        let sort_key = sort.unwrap_or("created_at");
        records.sort_by(|a, b| {
            let left = a.get(sort_key).map(Value::to_string).unwrap_or_default();
            let right = b.get(sort_key).map(Value::to_string).unwrap_or_default();
            left.cmp(&right)
        });

        Ok(records)
    }

    async fn filter(&self, kind: EntityKind, filter: &Filter) -> Result<Vec<Record>, StoreError> {
        let collections = self.collections.read().unwrap();
        Ok(collections
            .get(&kind)
            .map(|c| {
                c.values()
                    .filter(|record| filter.matches(record))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn create(&self, kind: EntityKind, fields: Record) -> Result<Record, StoreError> {
        let mut record = fields;
        let id = match record_id(&record) {
            Some(id) => id,
            None => {
                let id = Uuid::new_v4().to_string();
                record.insert("id".to_string(), Value::String(id.clone()));
                id
            }
        };
        record
            .entry("created_at".to_string())
            .or_insert_with(|| Value::String(Utc::now().to_rfc3339()));

        let mut collections = self.collections.write().unwrap();
        collections
            .entry(kind)
            .or_default()
            .insert(id, record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        kind: EntityKind,
        id: &str,
        fields: Record,
    ) -> Result<Record, StoreError> {
        let mut collections = self.collections.write().unwrap();
        let collection = collections.entry(kind).or_default();
        let record = collection.get_mut(id).ok_or_else(|| StoreError::NotFound {
            kind,
            id: id.to_string(),
        })?;

        for (key, value) in fields {
            // The id is server-owned once assigned
            if key == "id" {
                continue;
            }
            record.insert(key, value);
        }
        Ok(record.clone())
    }

    async fn delete(&self, kind: EntityKind, id: &str) -> Result<(), StoreError> {
        let mut collections = self.collections.write().unwrap();
        if let Some(collection) = collections.get_mut(&kind) {
            collection.remove(id);
        }
        // Deleting an absent id is a no-op success by contract
        Ok(())
    }
}
