//! The Storage Port: a generic collection-based CRUD abstraction with an
//! optimistic-version upsertor, shared by the Session Store, Client
//! Registry, and Registration Engine.
//!
//! This crate defines the contract only; `octoauth-postgres` (and an
//! in-memory double used by tests) provide implementations.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

use crate::error::StorageError;
use crate::types::{Document, Filter, Sort};

/// The main storage trait every backend must implement.
///
/// Implementations must be thread-safe (`Send + Sync`) since a single
/// instance is shared across all request-handling tasks.
#[async_trait]
pub trait StoragePort: Send + Sync {
    /// Fetches a document by its primary id.
    async fn get(&self, collection: &str, id: &str) -> Result<Document, StorageError>;

    /// Fetches the first document whose `field` equals `value`.
    async fn get_by(&self, collection: &str, field: &str, value: &str) -> Result<Document, StorageError>;

    /// Deletes a document by id. Idempotent: deleting a missing id is not an error.
    async fn delete(&self, collection: &str, id: &str) -> Result<(), StorageError>;

    /// Counts documents in a collection matching `filter`.
    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, StorageError>;

    /// Returns a page of documents matching `filter`, ordered by `sort`.
    async fn iterate(
        &self,
        collection: &str,
        filter: &Filter,
        sort: Option<&Sort>,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<Document>, StorageError>;

    /// Applies an upsert built via [`Upsertor`]. Returns the document id.
    async fn apply_upsert(&self, spec: UpsertSpec) -> Result<String, StorageError>;
}

/// The plain-data description of an upsert, handed to a [`StoragePort`]
/// implementation by [`Upsertor::execute`].
#[derive(Debug, Clone, Default)]
pub struct UpsertSpec {
    pub collection: String,
    pub id: Option<String>,
    pub expected_version: Option<u64>,
    pub sets: Vec<(String, Value)>,
    pub encrypted_keys: HashSet<String>,
    pub unsets: HashSet<String>,
}

/// Fluent builder for an optimistic-version upsert.
///
/// `set_encrypted` marks a key so the backend encrypts the value at rest
/// (see `octoauth::crypto`); the caller still supplies the plaintext value.
pub struct Upsertor {
    storage: Arc<dyn StoragePort>,
    spec: UpsertSpec,
}

impl Upsertor {
    #[must_use]
    pub fn new(
        storage: Arc<dyn StoragePort>,
        collection: impl Into<String>,
        id: Option<String>,
        expected_version: Option<u64>,
    ) -> Self {
        Self {
            storage,
            spec: UpsertSpec {
                collection: collection.into(),
                id,
                expected_version,
                ..Default::default()
            },
        }
    }

    #[must_use]
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.spec.sets.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn set_encrypted(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        self.spec.encrypted_keys.insert(key.clone());
        self.spec.sets.push((key, value.into()));
        self
    }

    #[must_use]
    pub fn unset(mut self, key: impl Into<String>) -> Self {
        self.spec.unsets.insert(key.into());
        self
    }

    /// Executes the upsert, returning the document id (the caller-supplied
    /// id, or a freshly generated one on create).
    pub async fn execute(self) -> Result<String, StorageError> {
        let storage = self.storage.clone();
        storage.apply_upsert(self.spec).await
    }
}

/// Starts an upsert against `collection`. Pass `id` to update an existing
/// document (with `expected_version` for optimistic concurrency) or `None`
/// to create one.
#[must_use]
pub fn upsertor(
    storage: Arc<dyn StoragePort>,
    collection: impl Into<String>,
    id: Option<String>,
    expected_version: Option<u64>,
) -> Upsertor {
    Upsertor::new(storage, collection, id, expected_version)
}
