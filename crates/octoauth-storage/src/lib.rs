//! # octoauth-storage
//!
//! The Storage Port abstraction shared by the Session Store, Client
//! Registry, and Registration Engine: a generic, collection-based CRUD
//! contract with an optimistic-version upsertor. Backends (an in-memory
//! test double here, Postgres in `octoauth-postgres`) implement
//! [`StoragePort`] without any of the service-level code knowing which one
//! is in play.

mod error;
mod memory;
mod traits;
mod types;

pub use error::{ErrorCategory, StorageError};
pub use memory::MemoryStorage;
pub use traits::{StoragePort, UpsertSpec, Upsertor, upsertor};
pub use types::{Document, Filter, Page, Sort, SortDirection};

/// Type alias for a storage result.
pub type StorageResult<T> = Result<T, StorageError>;

/// Type alias for a shared, backend-agnostic storage handle.
pub type DynStorage = std::sync::Arc<dyn StoragePort>;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{ErrorCategory, StorageError};
    pub use crate::traits::{StoragePort, UpsertSpec, Upsertor, upsertor};
    pub use crate::types::{Document, Filter, Page, Sort, SortDirection};
    pub use crate::{DynStorage, StorageResult};
}
