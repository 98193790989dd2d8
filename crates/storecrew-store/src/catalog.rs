//! In-memory catalog shared by the memory and file-backed stores

use crate::query::{apply_query, values_equal};
use crate::store::{StoreError, StoreResult, UpsertOutcome};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use storecrew_core::{Query, Record};

pub type Container = Vec<Record>;

/// store name -> container name -> records, in insertion order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    stores: BTreeMap<String, BTreeMap<String, Container>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list_stores(&self) -> Vec<String> {
        self.stores.keys().cloned().collect()
    }

    pub fn store_exists(&self, store: &str) -> bool {
        self.stores.contains_key(store)
    }

    pub fn create_store(&mut self, store: &str) -> bool {
        if self.stores.contains_key(store) {
            return false;
        }
        self.stores.insert(store.to_string(), BTreeMap::new());
        true
    }

    pub fn drop_store(&mut self, store: &str) -> bool {
        self.stores.remove(store).is_some()
    }

    pub fn rename_store(&mut self, from: &str, to: &str) -> StoreResult<bool> {
        if !self.stores.contains_key(from) {
            return Ok(false);
        }
        if self.stores.contains_key(to) {
            return Err(StoreError::AlreadyExists(format!("store '{}'", to)));
        }
        if let Some(containers) = self.stores.remove(from) {
            self.stores.insert(to.to_string(), containers);
        }
        Ok(true)
    }

    pub fn list_containers(&self, store: &str) -> StoreResult<Vec<String>> {
        self.stores
            .get(store)
            .map(|c| c.keys().cloned().collect())
            .ok_or_else(|| StoreError::MissingStore(store.to_string()))
    }

    pub fn container_exists(&self, store: &str, container: &str) -> bool {
        self.stores
            .get(store)
            .is_some_and(|c| c.contains_key(container))
    }

    pub fn create_container(&mut self, store: &str, container: &str) -> bool {
        let containers = self.stores.entry(store.to_string()).or_default();
        if containers.contains_key(container) {
            return false;
        }
        containers.insert(container.to_string(), Vec::new());
        true
    }

    pub fn drop_container(&mut self, store: &str, container: &str) -> bool {
        self.stores
            .get_mut(store)
            .is_some_and(|c| c.remove(container).is_some())
    }

    pub fn rename_container(&mut self, store: &str, from: &str, to: &str) -> StoreResult<bool> {
        let Some(containers) = self.stores.get_mut(store) else {
            return Ok(false);
        };
        if !containers.contains_key(from) {
            return Ok(false);
        }
        if containers.contains_key(to) {
            return Err(StoreError::AlreadyExists(format!("container '{}.{}'", store, to)));
        }
        if let Some(records) = containers.remove(from) {
            containers.insert(to.to_string(), records);
        }
        Ok(true)
    }

    fn container(&self, store: &str, container: &str) -> StoreResult<&Container> {
        self.stores
            .get(store)
            .and_then(|c| c.get(container))
            .ok_or_else(|| StoreError::missing_container(store, container))
    }

    fn container_mut(&mut self, store: &str, container: &str) -> StoreResult<&mut Container> {
        self.stores
            .get_mut(store)
            .and_then(|c| c.get_mut(container))
            .ok_or_else(|| StoreError::missing_container(store, container))
    }

    pub fn find(&self, store: &str, container: &str, query: &Query) -> StoreResult<Vec<Record>> {
        Ok(apply_query(self.container(store, container)?, query))
    }

    pub fn upsert(
        &mut self,
        store: &str,
        container: &str,
        key_field: &str,
        key: &Value,
        fields: &Record,
    ) -> StoreResult<UpsertOutcome> {
        let records = self.container_mut(store, container)?;

        if let Some(existing) = records
            .iter_mut()
            .find(|r| r.get(key_field).is_some_and(|v| values_equal(v, key)))
        {
            let mut changed = false;
            for (name, value) in fields {
                if name == "_id" {
                    continue;
                }
                if existing.get(name) != Some(value) {
                    existing.insert(name.clone(), value.clone());
                    changed = true;
                }
            }
            return Ok(UpsertOutcome::Updated { changed });
        }

        let id = uuid::Uuid::new_v4().to_string();
        let mut record = fields.clone();
        record.insert(key_field.to_string(), key.clone());
        record.insert("_id".to_string(), Value::String(id.clone()));
        record.insert(
            "created_at".to_string(),
            Value::String(chrono::Utc::now().to_rfc3339()),
        );
        records.push(record);
        Ok(UpsertOutcome::Inserted { id })
    }

    pub fn delete_one(
        &mut self,
        store: &str,
        container: &str,
        key_field: &str,
        key: &Value,
    ) -> StoreResult<bool> {
        let records = self.container_mut(store, container)?;
        match records
            .iter()
            .position(|r| r.get(key_field).is_some_and(|v| values_equal(v, key)))
        {
            Some(idx) => {
                records.remove(idx);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
