//! Bounded LRU cache for shared-memory entries.
//!
//! The cache is strictly an optimization: correctness never depends on it.
//! It is bounded both by entry count and by a byte budget; overflowing
//! either bound evicts least-recently-used entries until both hold again.

use std::collections::HashMap;

use crate::domain::models::{CacheStats, MemoryEntry};

#[derive(Debug, Clone)]
pub struct LruCacheConfig {
    pub max_entries: usize,
    pub max_bytes: u64,
}

impl Default for LruCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1_000,
            max_bytes: 16 * 1024 * 1024,
        }
    }
}

struct Slot {
    entry: MemoryEntry,
    bytes: u64,
    last_used: u64,
}

/// LRU keyed by `namespace\x00key`.
pub struct LruCache {
    config: LruCacheConfig,
    slots: HashMap<String, Slot>,
    clock: u64,
    bytes: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
}

fn cache_key(namespace: &str, key: &str) -> String {
    format!("{namespace}\x00{key}")
}

impl LruCache {
    pub fn new(config: LruCacheConfig) -> Self {
        Self {
            config,
            slots: HashMap::new(),
            clock: 0,
            bytes: 0,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    /// Admit an entry, evicting LRU entries until both bounds hold.
    pub fn put(&mut self, entry: MemoryEntry) {
        let bytes = estimate_size(&entry);
        if bytes > self.config.max_bytes || self.config.max_entries == 0 {
            // Too large to ever fit; don't churn the cache for it.
            return;
        }

        let key = cache_key(&entry.namespace, &entry.key);
        if let Some(old) = self.slots.remove(&key) {
            self.bytes -= old.bytes;
        }

        self.clock += 1;
        self.bytes += bytes;
        self.slots.insert(
            key,
            Slot {
                entry,
                bytes,
                last_used: self.clock,
            },
        );

        while self.slots.len() > self.config.max_entries || self.bytes > self.config.max_bytes {
            self.evict_lru();
        }
    }

    /// Look up an entry, refreshing its recency on hit.
    pub fn get(&mut self, namespace: &str, key: &str) -> Option<MemoryEntry> {
        let key = cache_key(namespace, key);
        self.clock += 1;
        match self.slots.get_mut(&key) {
            Some(slot) => {
                slot.last_used = self.clock;
                self.hits += 1;
                Some(slot.entry.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn remove(&mut self, namespace: &str, key: &str) {
        if let Some(slot) = self.slots.remove(&cache_key(namespace, key)) {
            self.bytes -= slot.bytes;
        }
    }

    /// Drop every cached entry of a namespace.
    pub fn remove_namespace(&mut self, namespace: &str) {
        let prefix = format!("{namespace}\x00");
        let keys: Vec<String> = self
            .slots
            .keys()
            .filter(|k| k.starts_with(&prefix))
            .cloned()
            .collect();
        for key in keys {
            if let Some(slot) = self.slots.remove(&key) {
                self.bytes -= slot.bytes;
            }
        }
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.bytes = 0;
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            entries: self.slots.len() as u64,
            bytes: self.bytes,
        }
    }

    fn evict_lru(&mut self) {
        let victim = self
            .slots
            .iter()
            .min_by_key(|(_, slot)| slot.last_used)
            .map(|(key, _)| key.clone());
        if let Some(key) = victim {
            if let Some(slot) = self.slots.remove(&key) {
                self.bytes -= slot.bytes;
                self.evictions += 1;
            }
        }
    }
}

fn estimate_size(entry: &MemoryEntry) -> u64 {
    // Serialized value size plus a fixed overhead for the envelope.
    entry.size + entry.key.len() as u64 + entry.namespace.len() as u64 + 64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::MemoryValue;

    fn entry(namespace: &str, key: &str, size: u64) -> MemoryEntry {
        let mut e = MemoryEntry::new(namespace, key, MemoryValue::from("v"));
        e.size = size;
        e
    }

    #[test]
    fn test_hit_and_miss_counters() {
        let mut cache = LruCache::new(LruCacheConfig::default());
        cache.put(entry("ns", "a", 10));
        assert!(cache.get("ns", "a").is_some());
        assert!(cache.get("ns", "b").is_none());
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_entry_count_bound() {
        let mut cache = LruCache::new(LruCacheConfig {
            max_entries: 2,
            max_bytes: u64::MAX >> 1,
        });
        cache.put(entry("ns", "a", 1));
        cache.put(entry("ns", "b", 1));
        cache.put(entry("ns", "c", 1));
        assert_eq!(cache.stats().entries, 2);
        assert_eq!(cache.stats().evictions, 1);
        // "a" was least recently used
        assert!(cache.get("ns", "a").is_none());
        assert!(cache.get("ns", "c").is_some());
    }

    #[test]
    fn test_byte_budget_bound() {
        let mut cache = LruCache::new(LruCacheConfig {
            max_entries: 100,
            max_bytes: 300,
        });
        cache.put(entry("ns", "a", 100));
        cache.put(entry("ns", "b", 100));
        // admitting "c" pushes bytes over budget; "a" goes
        cache.put(entry("ns", "c", 100));
        assert!(cache.stats().bytes <= 300);
        assert!(cache.get("ns", "a").is_none());
    }

    #[test]
    fn test_get_refreshes_recency() {
        let mut cache = LruCache::new(LruCacheConfig {
            max_entries: 2,
            max_bytes: u64::MAX >> 1,
        });
        cache.put(entry("ns", "a", 1));
        cache.put(entry("ns", "b", 1));
        cache.get("ns", "a");
        cache.put(entry("ns", "c", 1));
        // "b" is now the LRU victim, not "a"
        assert!(cache.get("ns", "a").is_some());
        assert!(cache.get("ns", "b").is_none());
    }

    #[test]
    fn test_oversized_value_is_not_admitted() {
        let mut cache = LruCache::new(LruCacheConfig {
            max_entries: 10,
            max_bytes: 100,
        });
        cache.put(entry("ns", "big", 10_000));
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_remove_namespace() {
        let mut cache = LruCache::new(LruCacheConfig::default());
        cache.put(entry("a", "k1", 1));
        cache.put(entry("a", "k2", 1));
        cache.put(entry("b", "k1", 1));
        cache.remove_namespace("a");
        assert!(cache.get("a", "k1").is_none());
        assert!(cache.get("b", "k1").is_some());
    }

    #[test]
    fn test_replace_updates_bytes() {
        let mut cache = LruCache::new(LruCacheConfig::default());
        cache.put(entry("ns", "a", 100));
        let before = cache.stats().bytes;
        cache.put(entry("ns", "a", 10));
        assert!(cache.stats().bytes < before);
        assert_eq!(cache.stats().entries, 1);
    }
}
