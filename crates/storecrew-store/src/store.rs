//! DocumentStore trait — named stores of named containers of keyed records

use serde_json::Value;
use storecrew_core::{ExecutionError, Query, Record};

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store not found: {0}")]
    MissingStore(String),

    #[error("container not found: {store}.{container}")]
    MissingContainer { store: String, container: String },

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn missing_container(store: impl Into<String>, container: impl Into<String>) -> Self {
        Self::MissingContainer {
            store: store.into(),
            container: container.into(),
        }
    }
}

impl From<StoreError> for ExecutionError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::MissingStore(_) | StoreError::MissingContainer { .. } => {
                ExecutionError::NotFound(e.to_string())
            }
            StoreError::AlreadyExists(name) => ExecutionError::Conflict(format!("{} already exists", name)),
            other => ExecutionError::StorageFault(other.to_string()),
        }
    }
}

/// What a conditional upsert did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted { id: String },
    /// A record with the key existed; `changed` is false when every submitted
    /// field already held the submitted value.
    Updated { changed: bool },
}

/// The persistent-store boundary.
///
/// Every mutating method is a single atomic conditional write: creators
/// report whether they created, destroyers whether they destroyed. Callers
/// rely on those answers rather than on their own locks, so two conversations
/// racing on the same target cannot both create it.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    fn name(&self) -> &str;

    async fn list_stores(&self) -> StoreResult<Vec<String>>;

    async fn store_exists(&self, store: &str) -> StoreResult<bool>;

    /// Returns false when the store already existed.
    async fn create_store(&self, store: &str) -> StoreResult<bool>;

    /// Returns false when there was nothing to drop.
    async fn drop_store(&self, store: &str) -> StoreResult<bool>;

    /// Returns false when `from` is missing; `AlreadyExists` when `to` is taken.
    async fn rename_store(&self, from: &str, to: &str) -> StoreResult<bool>;

    async fn list_containers(&self, store: &str) -> StoreResult<Vec<String>>;

    async fn container_exists(&self, store: &str, container: &str) -> StoreResult<bool>;

    /// Creates the store too if needed. Returns false when the container
    /// already existed.
    async fn create_container(&self, store: &str, container: &str) -> StoreResult<bool>;

    async fn drop_container(&self, store: &str, container: &str) -> StoreResult<bool>;

    async fn rename_container(&self, store: &str, from: &str, to: &str) -> StoreResult<bool>;

    async fn find(&self, store: &str, container: &str, query: &Query) -> StoreResult<Vec<Record>>;

    /// Resolve the record whose `key_field` equals `key`. Overwrite only the
    /// submitted fields when found; insert the fields plus `_id` and
    /// `created_at` otherwise.
    async fn upsert(
        &self,
        store: &str,
        container: &str,
        key_field: &str,
        key: &Value,
        fields: &Record,
    ) -> StoreResult<UpsertOutcome>;

    /// Delete the record whose `key_field` equals `key`. Returns false when
    /// no record matched.
    async fn delete_one(
        &self,
        store: &str,
        container: &str,
        key_field: &str,
        key: &Value,
    ) -> StoreResult<bool>;
}
