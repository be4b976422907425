//! PostgreSQL storage backend for octoauth.
//!
//! Implements `octoauth_storage::StoragePort` on top of a single generic
//! `documents` table, so every collection the rest of the crate family
//! opens (`sessions`, `clients`, `credentials`) lives in the same schema
//! without a bespoke table per entity.
//!
//! # Example
//!
//! ```ignore
//! use octoauth_postgres::PostgresStorage;
//!
//! let pool = sqlx_core::pool::PoolOptions::new().connect(database_url).await?;
//! let storage = PostgresStorage::new(pool);
//! storage.run_migrations().await?;
//! ```

pub mod documents;

use sqlx_core::pool::Pool;
use sqlx_postgres::Postgres;

/// PostgreSQL connection pool type alias.
pub type PgPool = Pool<Postgres>;

pub use documents::{PostgresStorage, SCHEMA};
