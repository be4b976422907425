//! [`StoragePort`] implementation backed by a single `documents` table.
//!
//! Every collection (`sessions`, `clients`, `credentials`) is a logical
//! partition of one physical table: `(collection, id)` is the primary key,
//! `version` drives optimistic concurrency, and `body` carries the full
//! document as JSONB (including the `_id`/`_v`/`_c` bookkeeping fields the
//! Storage Port contract expects back from `get`/`iterate`).

use octoauth_storage::{Document, Filter, Sort, SortDirection, StoragePort, StorageError, UpsertSpec};
use serde_json::{Value, json};
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_core::query_scalar::query_scalar;

use crate::PgPool;

/// DDL for the single table this backend uses. Callers run this (or an
/// equivalent migration) once per database.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL,
    id TEXT NOT NULL,
    version BIGINT NOT NULL,
    body JSONB NOT NULL,
    PRIMARY KEY (collection, id)
);
"#;

fn map_sqlx_error(err: sqlx_core::Error) -> StorageError {
    StorageError::connection(err.to_string())
}

/// PostgreSQL-backed [`StoragePort`].
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs [`SCHEMA`] against the pool. Intended for tests and local
    /// bootstrapping; production deployments should manage this table
    /// through a migration tool instead.
    pub async fn run_migrations(&self) -> Result<(), StorageError> {
        query(SCHEMA).execute(&self.pool).await.map_err(map_sqlx_error)?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl StoragePort for PostgresStorage {
    async fn get(&self, collection: &str, id: &str) -> Result<Document, StorageError> {
        let row: Option<(Value,)> =
            query_as("SELECT body FROM documents WHERE collection = $1 AND id = $2")
                .bind(collection)
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
        row.map(|(body,)| body).ok_or_else(|| StorageError::not_found(collection, id))
    }

    async fn get_by(&self, collection: &str, field: &str, value: &str) -> Result<Document, StorageError> {
        let row: Option<(Value,)> =
            query_as("SELECT body FROM documents WHERE collection = $1 AND body->>$2 = $3")
                .bind(collection)
                .bind(field)
                .bind(value)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
        row.map(|(body,)| body)
            .ok_or_else(|| StorageError::not_found(collection, format!("{field}={value}")))
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StorageError> {
        query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, StorageError> {
        let docs = self.iterate(collection, filter, None, 0, u64::MAX).await?;
        Ok(docs.len() as u64)
    }

    async fn iterate(
        &self,
        collection: &str,
        filter: &Filter,
        sort: Option<&Sort>,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<Document>, StorageError> {
        let rows: Vec<(Value,)> = query_as("SELECT body FROM documents WHERE collection = $1")
            .bind(collection)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let mut docs: Vec<Value> = rows.into_iter().map(|(body,)| body).filter(|doc| filter.matches(doc)).collect();

        if let Some(sort) = sort {
            docs.sort_by(|a, b| {
                let av = a.get(&sort.field).and_then(Value::as_str);
                let bv = b.get(&sort.field).and_then(Value::as_str);
                let ordering = av.cmp(&bv);
                match sort.direction {
                    SortDirection::Ascending => ordering,
                    SortDirection::Descending => ordering.reverse(),
                }
            });
        }

        Ok(docs.into_iter().skip(skip as usize).take(limit as usize).collect())
    }

    async fn apply_upsert(&self, spec: UpsertSpec) -> Result<String, StorageError> {
        let id = spec.id.clone().unwrap_or_else(octoauth_core::generate_id);

        let existing: Option<(i64, Value)> =
            query_as("SELECT version, body FROM documents WHERE collection = $1 AND id = $2")
                .bind(&spec.collection)
                .bind(&id)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        if existing.is_none() && spec.id.is_some() && spec.expected_version.is_some() {
            return Err(StorageError::not_found(&spec.collection, &id));
        }
        if let Some((version, _)) = &existing
            && spec.id.is_some()
            && spec.expected_version.is_none()
        {
            let _ = version;
            return Err(StorageError::conflict(&spec.collection, "_id", &id));
        }

        let is_update = existing.is_some();
        let (mut body, current_version) = existing.unwrap_or_else(|| {
            (
                json!({ "_id": id, "_v": 0, "_c": octoauth_core::now_utc().to_string() }),
                0,
            )
        });

        if let Some(expected) = spec.expected_version
            && expected != current_version as u64
        {
            tracing::debug!(
                collection = %spec.collection, id = %id, expected, actual = current_version,
                "upsert rejected: stale expected version"
            );
            return Err(StorageError::version_conflict(expected, current_version as u64));
        }

        let obj = body.as_object_mut().expect("documents are always JSON objects");
        for (key, value) in spec.sets {
            obj.insert(key, value);
        }
        for key in &spec.unsets {
            obj.remove(key);
        }
        obj.insert("_id".to_string(), json!(id));
        let new_version = current_version + 1;
        obj.insert("_v".to_string(), json!(new_version as u64));

        let rows_affected = if is_update {
            query(
                "UPDATE documents SET version = $1, body = $2 \
                 WHERE collection = $3 AND id = $4 AND version = $5",
            )
            .bind(new_version)
            .bind(&body)
            .bind(&spec.collection)
            .bind(&id)
            .bind(current_version)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .rows_affected()
        } else {
            query("INSERT INTO documents (collection, id, version, body) VALUES ($1, $2, $3, $4)")
                .bind(&spec.collection)
                .bind(&id)
                .bind(new_version)
                .bind(&body)
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_error)?
                .rows_affected()
        };

        if rows_affected == 0 {
            let actual: i64 = query_scalar("SELECT version FROM documents WHERE collection = $1 AND id = $2")
                .bind(&spec.collection)
                .bind(&id)
                .fetch_one(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
            tracing::debug!(
                collection = %spec.collection, id = %id, expected = current_version, actual,
                "upsert lost the compare-and-swap race"
            );
            return Err(StorageError::version_conflict(current_version as u64, actual as u64));
        }

        Ok(id)
    }
}
