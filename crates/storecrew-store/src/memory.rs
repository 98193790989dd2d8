//! Process-local document store

use crate::catalog::Catalog;
use crate::store::{DocumentStore, StoreResult, UpsertOutcome};
use serde_json::Value;
use storecrew_core::{Query, Record};
use tokio::sync::RwLock;

/// Each call takes the catalog lock once, so every conditional write is
/// atomic with respect to concurrent conversations.
#[derive(Default)]
pub struct MemoryStore {
    catalog: RwLock<Catalog>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_catalog(catalog: Catalog) -> Self {
        Self {
            catalog: RwLock::new(catalog),
        }
    }

    pub async fn snapshot(&self) -> Catalog {
        self.catalog.read().await.clone()
    }
}

#[async_trait::async_trait]
impl DocumentStore for MemoryStore {
    fn name(&self) -> &str { "memory" }

    async fn list_stores(&self) -> StoreResult<Vec<String>> {
        Ok(self.catalog.read().await.list_stores())
    }

    async fn store_exists(&self, store: &str) -> StoreResult<bool> {
        Ok(self.catalog.read().await.store_exists(store))
    }

    async fn create_store(&self, store: &str) -> StoreResult<bool> {
        Ok(self.catalog.write().await.create_store(store))
    }

    async fn drop_store(&self, store: &str) -> StoreResult<bool> {
        Ok(self.catalog.write().await.drop_store(store))
    }

    async fn rename_store(&self, from: &str, to: &str) -> StoreResult<bool> {
        self.catalog.write().await.rename_store(from, to)
    }

    async fn list_containers(&self, store: &str) -> StoreResult<Vec<String>> {
        self.catalog.read().await.list_containers(store)
    }

    async fn container_exists(&self, store: &str, container: &str) -> StoreResult<bool> {
        Ok(self.catalog.read().await.container_exists(store, container))
    }

    async fn create_container(&self, store: &str, container: &str) -> StoreResult<bool> {
        Ok(self.catalog.write().await.create_container(store, container))
    }

    async fn drop_container(&self, store: &str, container: &str) -> StoreResult<bool> {
        Ok(self.catalog.write().await.drop_container(store, container))
    }

    async fn rename_container(&self, store: &str, from: &str, to: &str) -> StoreResult<bool> {
        self.catalog.write().await.rename_container(store, from, to)
    }

    async fn find(&self, store: &str, container: &str, query: &Query) -> StoreResult<Vec<Record>> {
        self.catalog.read().await.find(store, container, query)
    }

    async fn upsert(
        &self,
        store: &str,
        container: &str,
        key_field: &str,
        key: &Value,
        fields: &Record,
    ) -> StoreResult<UpsertOutcome> {
        self.catalog
            .write()
            .await
            .upsert(store, container, key_field, key, fields)
    }

    async fn delete_one(
        &self,
        store: &str,
        container: &str,
        key_field: &str,
        key: &Value,
    ) -> StoreResult<bool> {
        self.catalog
            .write()
            .await
            .delete_one(store, container, key_field, key)
    }
}
