//! Storage areas
//!
//! Key-value stores with whole-value reads and writes, modelled on the
//! browser's `local`, `managed` and `session` areas. Values are JSON.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::fs;

use crate::error::StorageError;

#[async_trait]
pub trait StorageArea: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;

    async fn get_all(&self) -> Result<Map<String, Value>, StorageError>;

    /// Write every item, replacing existing values per key.
    async fn set(&self, items: Map<String, Value>) -> Result<(), StorageError>;

    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

// =============================================================================
// Memory
// =============================================================================

/// Area kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryArea {
    name: &'static str,
    items: Mutex<Map<String, Value>>,
    read_only: bool,
}

impl MemoryArea {
    pub fn new() -> Self {
        Self {
            name: "memory",
            ..Self::default()
        }
    }

    pub fn with_items(items: Map<String, Value>) -> Self {
        Self {
            items: Mutex::new(items),
            ..Self::new()
        }
    }

    /// Area rejecting writes, as the managed area does.
    pub fn read_only(name: &'static str, items: Map<String, Value>) -> Self {
        Self {
            name,
            items: Mutex::new(items),
            read_only: true,
        }
    }

    fn check_writable(&self) -> Result<(), StorageError> {
        if self.read_only {
            return Err(StorageError::ReadOnly(self.name));
        }
        Ok(())
    }

    fn items(&self) -> std::sync::MutexGuard<'_, Map<String, Value>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl StorageArea for MemoryArea {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.items().get(key).cloned())
    }

    async fn get_all(&self) -> Result<Map<String, Value>, StorageError> {
        Ok(self.items().clone())
    }

    async fn set(&self, items: Map<String, Value>) -> Result<(), StorageError> {
        self.check_writable()?;
        self.items().extend(items);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.check_writable()?;
        self.items().remove(key);
        Ok(())
    }
}

// =============================================================================
// JSON File
// =============================================================================

/// Area persisted as a single JSON object on disk.
///
/// The file is read once and rewritten in full on every change.
#[derive(Debug)]
pub struct JsonFileArea {
    path: PathBuf,
    cache: tokio::sync::Mutex<Option<Map<String, Value>>>,
}

impl JsonFileArea {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: tokio::sync::Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.clone(),
            source,
        }
    }

    async fn read(&self) -> Result<Map<String, Value>, StorageError> {
        match fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(Map::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Map::new()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    async fn write(&self, items: &Map<String, Value>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| self.io_error(e))?;
        }

        let content = serde_json::to_vec_pretty(items)?;
        fs::write(&self.path, content).await.map_err(|e| self.io_error(e))
    }

    /// Run `f` against a copy of the loaded items and write the copy back
    /// when it reports a change. The cache only takes the copy once the
    /// write succeeded.
    async fn modify<F>(&self, f: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut Map<String, Value>) -> bool + Send,
    {
        let mut cache = self.cache.lock().await;
        let mut items = match cache.as_ref() {
            Some(items) => items.clone(),
            None => self.read().await?,
        };

        if f(&mut items) {
            self.write(&items).await?;
        }

        *cache = Some(items);
        Ok(())
    }
}

#[async_trait]
impl StorageArea for JsonFileArea {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.get_all().await?.remove(key))
    }

    async fn get_all(&self) -> Result<Map<String, Value>, StorageError> {
        let mut cache = self.cache.lock().await;
        if let Some(items) = cache.as_ref() {
            return Ok(items.clone());
        }

        let items = self.read().await?;
        *cache = Some(items.clone());
        Ok(items)
    }

    async fn set(&self, items: Map<String, Value>) -> Result<(), StorageError> {
        self.modify(move |stored| {
            stored.extend(items);
            true
        })
        .await
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.modify(|stored| stored.remove(key).is_some()).await
    }
}
