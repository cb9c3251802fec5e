//! Shared memory domain model.
//!
//! Entries live in a namespaced key/value store shared by all agents and
//! swarm runs. A `(namespace, key)` pair is unique; TTL-bearing entries are
//! invisible once expired and reaped by the garbage collector.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Classification of a memory entry's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryEntryType {
    Context,
    Config,
    Metrics,
    Knowledge,
    Insight,
    Decision,
    Artifact,
}

impl Default for MemoryEntryType {
    fn default() -> Self {
        Self::Knowledge
    }
}

impl MemoryEntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Context => "context",
            Self::Config => "config",
            Self::Metrics => "metrics",
            Self::Knowledge => "knowledge",
            Self::Insight => "insight",
            Self::Decision => "decision",
            Self::Artifact => "artifact",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "context" => Some(Self::Context),
            "config" => Some(Self::Config),
            "metrics" => Some(Self::Metrics),
            "knowledge" => Some(Self::Knowledge),
            "insight" => Some(Self::Insight),
            "decision" => Some(Self::Decision),
            "artifact" => Some(Self::Artifact),
            _ => None,
        }
    }
}

/// A value as stored: strings pass through, everything else is JSON.
///
/// Keeping the discrimination explicit lets `retrieve` hand back exactly
/// what `store` was given (round-trip property), without guessing whether
/// a stored string was meant as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum MemoryValue {
    Text(String),
    Json(serde_json::Value),
}

impl MemoryValue {
    /// Serialized form written to the store.
    pub fn serialize(&self) -> Result<String, serde_json::Error> {
        match self {
            Self::Text(s) => Ok(s.clone()),
            Self::Json(v) => serde_json::to_string(v),
        }
    }

    /// Decode a stored string back into the original shape.
    pub fn deserialize(raw: &str, is_json: bool) -> Result<Self, serde_json::Error> {
        if is_json {
            Ok(Self::Json(serde_json::from_str(raw)?))
        } else {
            Ok(Self::Text(raw.to_string()))
        }
    }

    pub fn is_json(&self) -> bool {
        matches!(self, Self::Json(_))
    }
}

impl From<&str> for MemoryValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for MemoryValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<serde_json::Value> for MemoryValue {
    fn from(v: serde_json::Value) -> Self {
        Self::Json(v)
    }
}

/// A persisted shared-memory entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub namespace: String,
    pub key: String,
    pub value: MemoryValue,
    pub entry_type: MemoryEntryType,
    /// Confidence in [0, 1].
    pub confidence: f64,
    pub created_by: String,
    /// Marked when the serialized size exceeded the compression threshold.
    pub compressed: bool,
    /// Serialized size in bytes.
    pub size: u64,
    pub ttl_seconds: Option<u64>,
    /// Unix epoch seconds; set iff `ttl_seconds` is set.
    pub expires_at_epoch: Option<i64>,
    pub access_count: u64,
    pub tags: Vec<String>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub accessed_at: DateTime<Utc>,
}

impl MemoryEntry {
    /// Create a new entry in the given namespace.
    pub fn new(
        namespace: impl Into<String>,
        key: impl Into<String>,
        value: MemoryValue,
    ) -> Self {
        let now = Utc::now();
        Self {
            namespace: namespace.into(),
            key: key.into(),
            value,
            entry_type: MemoryEntryType::default(),
            confidence: 1.0,
            created_by: "system".to_string(),
            compressed: false,
            size: 0,
            ttl_seconds: None,
            expires_at_epoch: None,
            access_count: 0,
            tags: Vec::new(),
            metadata: HashMap::new(),
            created_at: now,
            accessed_at: now,
        }
    }

    pub fn with_type(mut self, entry_type: MemoryEntryType) -> Self {
        self.entry_type = entry_type;
        self
    }

    pub fn with_creator(mut self, created_by: impl Into<String>) -> Self {
        self.created_by = created_by.into();
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Set the TTL; `expires_at_epoch` is derived from `created_at`.
    pub fn with_ttl_seconds(mut self, ttl_seconds: u64) -> Self {
        self.ttl_seconds = Some(ttl_seconds);
        self.expires_at_epoch = Some(self.created_at.timestamp() + ttl_seconds as i64);
        self
    }

    /// Whether this entry has expired as of `now` (epoch seconds).
    pub fn is_expired_at(&self, now_epoch: i64) -> bool {
        matches!(self.expires_at_epoch, Some(exp) if exp <= now_epoch)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now().timestamp())
    }

    /// Record a read.
    pub fn record_access(&mut self) {
        self.access_count += 1;
        self.accessed_at = Utc::now();
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.key.is_empty() {
            return Err("Memory key cannot be empty".to_string());
        }
        if self.namespace.is_empty() {
            return Err("Memory namespace cannot be empty".to_string());
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(format!("Memory confidence must be in [0, 1], got {}", self.confidence));
        }
        Ok(())
    }
}

/// Filters for `search`.
#[derive(Debug, Clone, Default)]
pub struct MemorySearch {
    /// Key pattern; `*` is a wildcard.
    pub pattern: Option<String>,
    pub namespace: Option<String>,
    /// Entries matching any of these tags.
    pub tags: Vec<String>,
    pub limit: usize,
    pub offset: usize,
}

impl MemorySearch {
    pub fn new() -> Self {
        Self {
            limit: 50,
            ..Self::default()
        }
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn namespace(mut self, ns: impl Into<String>) -> Self {
        self.namespace = Some(ns.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}

/// Per-namespace aggregates for `stats()`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NamespaceStats {
    pub entries: u64,
    pub total_bytes: u64,
}

/// Store-wide statistics plus cache counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryStats {
    pub namespaces: HashMap<String, NamespaceStats>,
    pub total_entries: u64,
    pub total_bytes: u64,
    pub cache: CacheStats,
}

/// Observability counters for the LRU cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: u64,
    pub bytes: u64,
}
