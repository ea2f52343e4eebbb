//! Key-value persistence used by the artist genre cache.
//!
//! The cache only needs string keys and string values with an optional
//! per-key TTL. [`MemoryStore`] keeps everything in a concurrent map and is
//! what tests use; [`FileStore`] wraps a memory store and snapshots it to a
//! JSON file in the local data directory.

use std::{collections::HashMap, path::PathBuf, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::PipelineError;

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, PipelineError>;

    /// Stores `value` under `key`. The last writer wins.
    async fn put(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<(), PipelineError>;

    async fn delete(&self, key: &str) -> Result<bool, PipelineError>;

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, PipelineError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredValue {
    value: String,
    #[serde(default)]
    expires_at: Option<i64>,
}

impl StoredValue {
    fn is_expired(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: Arc<DashMap<String, StoredValue>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn snapshot(&self) -> HashMap<String, StoredValue> {
        let now = Utc::now().timestamp();
        self.data
            .iter()
            .filter(|entry| !entry.value().is_expired(now))
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    fn restore(snapshot: HashMap<String, StoredValue>) -> Self {
        let store = Self::new();
        for (key, value) in snapshot {
            store.data.insert(key, value);
        }
        store
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, PipelineError> {
        let now = Utc::now().timestamp();
        if let Some(entry) = self.data.get(key) {
            if !entry.is_expired(now) {
                return Ok(Some(entry.value.clone()));
            }
        }
        // Re-checked under the shard lock so a concurrent put survives.
        self.data.remove_if(key, |_, v| v.is_expired(now));
        Ok(None)
    }

    async fn put(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<(), PipelineError> {
        let expires_at = ttl.map(|ttl| Utc::now().timestamp() + ttl.as_secs() as i64);
        self.data
            .insert(key.to_string(), StoredValue { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, PipelineError> {
        Ok(self.data.remove(key).is_some())
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, PipelineError> {
        let mut keys: Vec<String> = self
            .data
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }
}

/// A [`MemoryStore`] backed by a JSON file.
///
/// Writes only reach the disk on [`FileStore::flush`].
#[derive(Debug)]
pub struct FileStore {
    inner: MemoryStore,
    path: PathBuf,
}

impl FileStore {
    /// Empty store that will be written to `path`.
    pub fn new(path: PathBuf) -> Self {
        Self {
            inner: MemoryStore::new(),
            path,
        }
    }

    /// Opens the store at `path`. A missing file yields an empty store.
    pub async fn open(path: PathBuf) -> Result<Self, PipelineError> {
        let content = match async_fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::new(path)),
            Err(e) => return Err(e.into()),
        };

        let snapshot: HashMap<String, StoredValue> = serde_json::from_str(&content)?;
        debug!(entries = snapshot.len(), path = %path.display(), "loaded store");
        Ok(Self {
            inner: MemoryStore::restore(snapshot),
            path,
        })
    }

    pub async fn flush(&self) -> Result<(), PipelineError> {
        if let Some(parent) = self.path.parent() {
            async_fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(&self.inner.snapshot())?;
        async_fs::write(&self.path, json).await?;
        Ok(())
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, PipelineError> {
        self.inner.get(key).await
    }

    async fn put(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<(), PipelineError> {
        self.inner.put(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<bool, PipelineError> {
        self.inner.delete(key).await
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, PipelineError> {
        self.inner.keys(prefix).await
    }
}
