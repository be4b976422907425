//! In-memory [`StoragePort`] implementation used as a test double by the
//! Session Store, Client Registry, and Registration Engine test suites.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::StorageError;
use crate::traits::{StoragePort, UpsertSpec};
use crate::types::{Document, Filter, Sort, SortDirection};

type Collection = HashMap<String, Value>;

#[derive(Default)]
pub struct MemoryStorage {
    collections: Mutex<HashMap<String, Collection>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn version_of(doc: &Value) -> u64 {
        doc.get("_v").and_then(Value::as_u64).unwrap_or(0)
    }
}

#[async_trait]
impl StoragePort for MemoryStorage {
    async fn get(&self, collection: &str, id: &str) -> Result<Document, StorageError> {
        let collections = self.collections.lock().unwrap();
        collections
            .get(collection)
            .and_then(|c| c.get(id))
            .cloned()
            .ok_or_else(|| StorageError::not_found(collection, id))
    }

    async fn get_by(&self, collection: &str, field: &str, value: &str) -> Result<Document, StorageError> {
        let collections = self.collections.lock().unwrap();
        collections
            .get(collection)
            .and_then(|c| c.values().find(|doc| doc.get(field).and_then(Value::as_str) == Some(value)))
            .cloned()
            .ok_or_else(|| StorageError::not_found(collection, format!("{field}={value}")))
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StorageError> {
        let mut collections = self.collections.lock().unwrap();
        if let Some(c) = collections.get_mut(collection) {
            c.remove(id);
        }
        Ok(())
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, StorageError> {
        let collections = self.collections.lock().unwrap();
        let count = collections
            .get(collection)
            .map(|c| c.values().filter(|doc| filter.matches(doc)).count())
            .unwrap_or(0);
        Ok(count as u64)
    }

    async fn iterate(
        &self,
        collection: &str,
        filter: &Filter,
        sort: Option<&Sort>,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<Document>, StorageError> {
        let collections = self.collections.lock().unwrap();
        let mut docs: Vec<Value> = collections
            .get(collection)
            .map(|c| c.values().filter(|doc| filter.matches(doc)).cloned().collect())
            .unwrap_or_default();

        if let Some(sort) = sort {
            docs.sort_by(|a, b| {
                let av = a.get(&sort.field);
                let bv = b.get(&sort.field);
                let ordering = av.and_then(Value::as_str).cmp(&bv.and_then(Value::as_str));
                match sort.direction {
                    SortDirection::Ascending => ordering,
                    SortDirection::Descending => ordering.reverse(),
                }
            });
        }

        Ok(docs.into_iter().skip(skip as usize).take(limit as usize).collect())
    }

    async fn apply_upsert(&self, spec: UpsertSpec) -> Result<String, StorageError> {
        let mut collections = self.collections.lock().unwrap();
        let entry = collections.entry(spec.collection.clone()).or_default();

        let id = match spec.id.clone() {
            Some(id) if entry.contains_key(&id) => {
                if spec.expected_version.is_none() {
                    return Err(StorageError::conflict(&spec.collection, "_id", &id));
                }
                id
            }
            Some(id) => {
                if spec.expected_version.is_some() {
                    return Err(StorageError::not_found(&spec.collection, &id));
                }
                id
            }
            None => octoauth_core::generate_id(),
        };

        let mut doc = entry.get(&id).cloned().unwrap_or_else(|| {
            json!({
                "_id": id,
                "_v": 0,
                "_c": octoauth_core::now_utc().to_string(),
            })
        });

        let current_version = Self::version_of(&doc);
        if let Some(expected) = spec.expected_version
            && expected != current_version
        {
            return Err(StorageError::version_conflict(expected, current_version));
        }

        let obj = doc.as_object_mut().expect("documents are always JSON objects");
        for (key, value) in spec.sets {
            obj.insert(key, value);
        }
        for key in spec.unsets {
            obj.remove(&key);
        }
        obj.insert("_id".to_string(), json!(id));
        obj.insert("_v".to_string(), json!(current_version + 1));

        entry.insert(id.clone(), doc);
        Ok(id)
    }
}
