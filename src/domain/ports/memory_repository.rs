//! Shared-memory repository port.

use async_trait::async_trait;

use crate::domain::errors::HiveResult;
use crate::domain::models::{MemoryEntry, MemorySearch, MemoryStats};

/// Repository interface for the shared memory store.
#[async_trait]
pub trait MemoryRepository: Send + Sync {
    /// Insert or replace the entry keyed by `(namespace, key)`.
    async fn upsert(&self, entry: &MemoryEntry) -> HiveResult<()>;

    /// Get an entry; expired rows are returned so callers can reap them.
    async fn get(&self, key: &str, namespace: &str) -> HiveResult<Option<MemoryEntry>>;

    /// Refresh `accessed_at` and bump `access_count`.
    async fn touch(&self, key: &str, namespace: &str) -> HiveResult<()>;

    /// List a namespace ordered by `accessed_at` descending.
    async fn list(&self, namespace: &str, limit: usize, offset: usize)
        -> HiveResult<Vec<MemoryEntry>>;

    /// Search by key pattern / namespace / tags, ordered by `accessed_at` descending.
    async fn search(&self, search: &MemorySearch) -> HiveResult<Vec<MemoryEntry>>;

    /// Delete one entry. Returns whether a row was removed.
    async fn delete(&self, key: &str, namespace: &str) -> HiveResult<bool>;

    /// Delete every entry in a namespace. Returns the removed count.
    async fn clear_namespace(&self, namespace: &str) -> HiveResult<u64>;

    /// Delete all rows expired as of `now_epoch`. Returns the removed count.
    async fn delete_expired(&self, now_epoch: i64) -> HiveResult<u64>;

    /// Per-namespace counts and sizes.
    async fn stats(&self) -> HiveResult<MemoryStats>;
}
