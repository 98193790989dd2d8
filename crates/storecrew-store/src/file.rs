//! JSON-file document store
//!
//! The whole catalog lives in one JSON file that may be shared by several
//! processes. Every call takes an advisory lock on `<file>.lock` and reads
//! the file fresh while holding it: shared for reads, exclusive for writes.
//! A write is applied to the loaded catalog, checkpointed to `<file>.tmp`,
//! and renamed over the original before the lock is released. A failed write
//! leaves the file untouched.

use crate::catalog::Catalog;
use crate::store::{DocumentStore, StoreError, StoreResult, UpsertOutcome};
use fs2::FileExt;
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use storecrew_core::{Query, Record};
use tracing::{debug, info};

pub struct JsonFileStore {
    path: PathBuf,
}

/// Held for the duration of one call; dropping it releases the OS lock.
struct FileLock(File);

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.0);
    }
}

impl JsonFileStore {
    /// Open the catalog at `path`. A missing or empty file is an empty
    /// catalog; a file that does not parse is an error.
    pub async fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let store = Self { path: path.into() };
        let _lock = store.lock(false).await?;
        let catalog = store.load().await?;
        info!("Opened JSON store {} ({} stores)", store.path.display(), catalog.list_stores().len());
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("json.lock")
    }

    /// Block (off the runtime) until the lock on `<file>.lock` is held.
    async fn lock(&self, exclusive: bool) -> StoreResult<FileLock> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let lock_path = self.lock_path();
        let file = tokio::task::spawn_blocking(move || -> std::io::Result<File> {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(&lock_path)?;
            if exclusive {
                FileExt::lock_exclusive(&file)?;
            } else {
                FileExt::lock_shared(&file)?;
            }
            Ok(file)
        })
        .await
        .map_err(|e| StoreError::Backend(format!("lock task failed: {}", e)))??;
        Ok(FileLock(file))
    }

    async fn load(&self) -> StoreResult<Catalog> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(Catalog::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Catalog::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn read<T>(&self, f: impl FnOnce(&Catalog) -> T) -> StoreResult<T> {
        let _lock = self.lock(false).await?;
        let catalog = self.load().await?;
        Ok(f(&catalog))
    }

    /// Load under the exclusive lock, apply `f`, persist when it changed
    /// something.
    async fn mutate<T>(&self, f: impl FnOnce(&mut Catalog) -> StoreResult<(T, bool)>) -> StoreResult<T> {
        let _lock = self.lock(true).await?;
        let mut catalog = self.load().await?;
        let (out, dirty) = f(&mut catalog)?;
        if dirty {
            self.persist(&catalog).await?;
        }
        Ok(out)
    }

    async fn persist(&self, catalog: &Catalog) -> StoreResult<()> {
        let json = serde_json::to_string_pretty(catalog)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!("Checkpointed {}", self.path.display());
        Ok(())
    }
}

#[async_trait::async_trait]
impl DocumentStore for JsonFileStore {
    fn name(&self) -> &str { "json-file" }

    async fn list_stores(&self) -> StoreResult<Vec<String>> {
        self.read(|c| c.list_stores()).await
    }

    async fn store_exists(&self, store: &str) -> StoreResult<bool> {
        self.read(|c| c.store_exists(store)).await
    }

    async fn create_store(&self, store: &str) -> StoreResult<bool> {
        self.mutate(|c| {
            let created = c.create_store(store);
            Ok((created, created))
        })
        .await
    }

    async fn drop_store(&self, store: &str) -> StoreResult<bool> {
        self.mutate(|c| {
            let dropped = c.drop_store(store);
            Ok((dropped, dropped))
        })
        .await
    }

    async fn rename_store(&self, from: &str, to: &str) -> StoreResult<bool> {
        self.mutate(|c| {
            let renamed = c.rename_store(from, to)?;
            Ok((renamed, renamed))
        })
        .await
    }

    async fn list_containers(&self, store: &str) -> StoreResult<Vec<String>> {
        self.read(|c| c.list_containers(store)).await?
    }

    async fn container_exists(&self, store: &str, container: &str) -> StoreResult<bool> {
        self.read(|c| c.container_exists(store, container)).await
    }

    async fn create_container(&self, store: &str, container: &str) -> StoreResult<bool> {
        self.mutate(|c| {
            let created = c.create_container(store, container);
            Ok((created, created))
        })
        .await
    }

    async fn drop_container(&self, store: &str, container: &str) -> StoreResult<bool> {
        self.mutate(|c| {
            let dropped = c.drop_container(store, container);
            Ok((dropped, dropped))
        })
        .await
    }

    async fn rename_container(&self, store: &str, from: &str, to: &str) -> StoreResult<bool> {
        self.mutate(|c| {
            let renamed = c.rename_container(store, from, to)?;
            Ok((renamed, renamed))
        })
        .await
    }

    async fn find(&self, store: &str, container: &str, query: &Query) -> StoreResult<Vec<Record>> {
        self.read(|c| c.find(store, container, query)).await?
    }

    async fn upsert(
        &self,
        store: &str,
        container: &str,
        key_field: &str,
        key: &Value,
        fields: &Record,
    ) -> StoreResult<UpsertOutcome> {
        self.mutate(|c| {
            let outcome = c.upsert(store, container, key_field, key, fields)?;
            let dirty = !matches!(outcome, UpsertOutcome::Updated { changed: false });
            Ok((outcome, dirty))
        })
        .await
    }

    async fn delete_one(
        &self,
        store: &str,
        container: &str,
        key_field: &str,
        key: &Value,
    ) -> StoreResult<bool> {
        self.mutate(|c| {
            let deleted = c.delete_one(store, container, key_field, key)?;
            Ok((deleted, deleted))
        })
        .await
    }
}
