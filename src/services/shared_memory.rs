//! SharedMemory service: typed access to the memory store with an LRU cache.
//!
//! All writes funnel through the repository (and so serialize in the
//! store); the cache only accelerates reads and is evicted on every
//! mutation of the affected keys.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, instrument};

use crate::domain::errors::{HiveError, HiveResult};
use crate::domain::models::{
    MemoryEntry, MemoryEntryType, MemorySearch, MemoryStats, MemoryValue,
};
use crate::domain::ports::MemoryRepository;
use crate::services::event_bus::{EventBus, MemoryEvent};
use crate::services::lru_cache::{LruCache, LruCacheConfig};

pub const DEFAULT_NAMESPACE: &str = "default";

/// Serialized sizes above this are marked compressed.
pub const DEFAULT_COMPRESS_THRESHOLD: u64 = 10 * 1024;

/// Options for `store`.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub namespace: String,
    pub ttl_seconds: Option<u64>,
    pub tags: Vec<String>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub entry_type: MemoryEntryType,
    pub created_by: String,
    pub compress_threshold: u64,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            ttl_seconds: None,
            tags: Vec::new(),
            metadata: HashMap::new(),
            entry_type: MemoryEntryType::default(),
            created_by: "system".to_string(),
            compress_threshold: DEFAULT_COMPRESS_THRESHOLD,
        }
    }
}

impl StoreOptions {
    pub fn namespace(mut self, ns: impl Into<String>) -> Self {
        self.namespace = ns.into();
        self
    }

    pub fn ttl_seconds(mut self, ttl: u64) -> Self {
        self.ttl_seconds = Some(ttl);
        self
    }

    pub fn tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn entry_type(mut self, entry_type: MemoryEntryType) -> Self {
        self.entry_type = entry_type;
        self
    }

    pub fn created_by(mut self, creator: impl Into<String>) -> Self {
        self.created_by = creator.into();
        self
    }
}

/// Namespaced key/value layer over the memory store.
pub struct SharedMemory {
    repository: Arc<dyn MemoryRepository>,
    cache: Mutex<LruCache>,
    events: EventBus,
}

impl SharedMemory {
    pub fn new(repository: Arc<dyn MemoryRepository>, events: EventBus) -> Self {
        Self::with_cache_config(repository, events, LruCacheConfig::default())
    }

    pub fn with_cache_config(
        repository: Arc<dyn MemoryRepository>,
        events: EventBus,
        cache_config: LruCacheConfig,
    ) -> Self {
        Self {
            repository,
            cache: Mutex::new(LruCache::new(cache_config)),
            events,
        }
    }

    /// Upsert a value under `(namespace, key)`.
    #[instrument(skip(self, value, options), fields(namespace = %options.namespace))]
    pub async fn store(
        &self,
        key: &str,
        value: MemoryValue,
        options: StoreOptions,
    ) -> HiveResult<MemoryEntry> {
        let serialized = value.serialize()?;
        let size = serialized.len() as u64;

        let mut entry = MemoryEntry::new(options.namespace.clone(), key, value)
            .with_type(options.entry_type)
            .with_creator(options.created_by.clone())
            .with_tags(options.tags.clone());
        entry.metadata = options.metadata.clone();
        entry.size = size;
        entry.compressed = size > options.compress_threshold;
        if let Some(ttl) = options.ttl_seconds {
            entry = entry.with_ttl_seconds(ttl);
        }

        entry
            .validate()
            .map_err(HiveError::ValidationFailed)?;
        self.repository.upsert(&entry).await?;

        self.cache
            .lock()
            .expect("cache lock poisoned")
            .put(entry.clone());

        self.events.publish_memory(MemoryEvent::Stored {
            namespace: entry.namespace.clone(),
            key: entry.key.clone(),
            size,
            compressed: entry.compressed,
        });

        Ok(entry)
    }

    /// Fetch the value for `(namespace, key)`; expired entries are deleted
    /// and reported as absent. Refreshes access accounting on hit.
    #[instrument(skip(self))]
    pub async fn retrieve(&self, key: &str, namespace: &str) -> HiveResult<Option<MemoryValue>> {
        let now_epoch = Utc::now().timestamp();

        let cached = self
            .cache
            .lock()
            .expect("cache lock poisoned")
            .get(namespace, key);
        if let Some(entry) = cached {
            if entry.is_expired_at(now_epoch) {
                self.delete(key, namespace).await?;
                return Ok(None);
            }
            self.repository.touch(key, namespace).await?;
            return Ok(Some(entry.value));
        }

        let Some(mut entry) = self.repository.get(key, namespace).await? else {
            return Ok(None);
        };

        if entry.is_expired_at(now_epoch) {
            debug!(key, namespace, "entry expired, reaping on read");
            self.repository.delete(key, namespace).await?;
            return Ok(None);
        }

        self.repository.touch(key, namespace).await?;
        entry.record_access();
        let value = entry.value.clone();
        self.cache
            .lock()
            .expect("cache lock poisoned")
            .put(entry);
        Ok(Some(value))
    }

    /// List a namespace ordered by last access, newest first.
    pub async fn list(
        &self,
        namespace: &str,
        limit: usize,
        offset: usize,
    ) -> HiveResult<Vec<MemoryEntry>> {
        self.repository.list(namespace, limit, offset).await
    }

    /// Search by key pattern, namespace, and tags.
    pub async fn search(&self, search: &MemorySearch) -> HiveResult<Vec<MemoryEntry>> {
        self.repository.search(search).await
    }

    /// Delete one entry.
    pub async fn delete(&self, key: &str, namespace: &str) -> HiveResult<bool> {
        let removed = self.repository.delete(key, namespace).await?;
        self.cache
            .lock()
            .expect("cache lock poisoned")
            .remove(namespace, key);
        if removed {
            self.events.publish_memory(MemoryEvent::Deleted {
                namespace: namespace.to_string(),
                key: key.to_string(),
            });
        }
        Ok(removed)
    }

    /// Delete every entry in a namespace.
    pub async fn clear(&self, namespace: &str) -> HiveResult<u64> {
        let removed = self.repository.clear_namespace(namespace).await?;
        self.cache
            .lock()
            .expect("cache lock poisoned")
            .remove_namespace(namespace);
        self.events.publish_memory(MemoryEvent::NamespaceCleared {
            namespace: namespace.to_string(),
            removed,
        });
        Ok(removed)
    }

    /// Per-namespace counts and sizes plus cache counters.
    pub async fn stats(&self) -> HiveResult<MemoryStats> {
        let mut stats = self.repository.stats().await?;
        stats.cache = self.cache.lock().expect("cache lock poisoned").stats();
        Ok(stats)
    }

    /// Delete every expired row. Returns the cleaned count.
    #[instrument(skip(self))]
    pub async fn gc(&self) -> HiveResult<u64> {
        let cleaned = self
            .repository
            .delete_expired(Utc::now().timestamp())
            .await?;
        if cleaned > 0 {
            // Expired rows may still sit in the cache; drop everything
            // rather than tracking per-row expiry there.
            self.cache.lock().expect("cache lock poisoned").clear();
        }
        self.events.publish_memory(MemoryEvent::GcCompleted {
            cleaned,
            at: Utc::now(),
        });
        Ok(cleaned)
    }
}
