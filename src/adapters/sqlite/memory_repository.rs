//! SQLite implementation of the MemoryRepository.
//!
//! One implementation serves both memory tables: the shared `memory_store`
//! in the swarm database and the hive's `collective_memory`, which share a
//! column set. The table name is fixed at construction.

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::collections::HashMap;

use crate::domain::errors::{HiveError, HiveResult};
use crate::domain::models::{
    MemoryEntry, MemoryEntryType, MemorySearch, MemoryStats, MemoryValue, NamespaceStats,
};
use crate::domain::ports::MemoryRepository;

use super::swarm_repository::parse_ts;

#[derive(Clone)]
pub struct SqliteMemoryRepository {
    pool: SqlitePool,
    table: &'static str,
}

impl SqliteMemoryRepository {
    /// Repository over the shared `memory_store` table.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            table: "memory_store",
        }
    }

    /// Repository over the hive's `collective_memory` table.
    pub fn collective(pool: SqlitePool) -> Self {
        Self {
            pool,
            table: "collective_memory",
        }
    }
}

#[async_trait]
impl MemoryRepository for SqliteMemoryRepository {
    async fn upsert(&self, entry: &MemoryEntry) -> HiveResult<()> {
        let value = entry.value.serialize()?;
        sqlx::query(&format!(
            "INSERT INTO {} (key, namespace, value, value_format, entry_type, confidence,
             created_by, compressed, size, ttl_seconds, expires_at, access_count, tags,
             metadata, created_at, accessed_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (key, namespace) DO UPDATE SET
                value = excluded.value,
                value_format = excluded.value_format,
                entry_type = excluded.entry_type,
                confidence = excluded.confidence,
                created_by = excluded.created_by,
                compressed = excluded.compressed,
                size = excluded.size,
                ttl_seconds = excluded.ttl_seconds,
                expires_at = excluded.expires_at,
                tags = excluded.tags,
                metadata = excluded.metadata,
                accessed_at = excluded.accessed_at",
            self.table
        ))
        .bind(&entry.key)
        .bind(&entry.namespace)
        .bind(value)
        .bind(if entry.value.is_json() { "json" } else { "text" })
        .bind(entry.entry_type.as_str())
        .bind(entry.confidence)
        .bind(&entry.created_by)
        .bind(i64::from(entry.compressed))
        .bind(entry.size as i64)
        .bind(entry.ttl_seconds.map(|t| t as i64))
        .bind(entry.expires_at_epoch)
        .bind(entry.access_count as i64)
        .bind(serde_json::to_string(&entry.tags)?)
        .bind(serde_json::to_string(&entry.metadata)?)
        .bind(entry.created_at.to_rfc3339())
        .bind(entry.accessed_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, key: &str, namespace: &str) -> HiveResult<Option<MemoryEntry>> {
        let row: Option<MemoryRow> = sqlx::query_as(&format!(
            "SELECT * FROM {} WHERE key = ? AND namespace = ?",
            self.table
        ))
        .bind(key)
        .bind(namespace)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn touch(&self, key: &str, namespace: &str) -> HiveResult<()> {
        sqlx::query(&format!(
            "UPDATE {} SET accessed_at = ?, access_count = access_count + 1
             WHERE key = ? AND namespace = ?",
            self.table
        ))
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(key)
        .bind(namespace)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list(
        &self,
        namespace: &str,
        limit: usize,
        offset: usize,
    ) -> HiveResult<Vec<MemoryEntry>> {
        let rows: Vec<MemoryRow> = sqlx::query_as(&format!(
            "SELECT * FROM {} WHERE namespace = ?
             ORDER BY accessed_at DESC LIMIT ? OFFSET ?",
            self.table
        ))
        .bind(namespace)
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn search(&self, search: &MemorySearch) -> HiveResult<Vec<MemoryEntry>> {
        let mut sql = format!("SELECT * FROM {} WHERE 1=1", self.table);
        let mut bindings: Vec<String> = Vec::new();

        if let Some(ns) = &search.namespace {
            sql.push_str(" AND namespace = ?");
            bindings.push(ns.clone());
        }
        if let Some(pattern) = &search.pattern {
            sql.push_str(" AND key LIKE ?");
            bindings.push(pattern.replace('*', "%"));
        }
        for tag in &search.tags {
            // tags column is a JSON array of strings
            sql.push_str(" AND tags LIKE ?");
            bindings.push(format!("%\"{tag}\"%"));
        }
        sql.push_str(" ORDER BY accessed_at DESC LIMIT ? OFFSET ?");

        let mut query = sqlx::query_as::<_, MemoryRow>(&sql);
        for binding in &bindings {
            query = query.bind(binding);
        }
        query = query.bind(search.limit.max(1) as i64).bind(search.offset as i64);

        let rows: Vec<MemoryRow> = query.fetch_all(&self.pool).await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn delete(&self, key: &str, namespace: &str) -> HiveResult<bool> {
        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE key = ? AND namespace = ?",
            self.table
        ))
        .bind(key)
        .bind(namespace)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear_namespace(&self, namespace: &str) -> HiveResult<u64> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE namespace = ?", self.table))
            .bind(namespace)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_expired(&self, now_epoch: i64) -> HiveResult<u64> {
        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE expires_at IS NOT NULL AND expires_at <= ?",
            self.table
        ))
        .bind(now_epoch)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn stats(&self) -> HiveResult<MemoryStats> {
        let rows: Vec<(String, i64, i64)> = sqlx::query_as(&format!(
            "SELECT namespace, COUNT(*), COALESCE(SUM(size), 0) FROM {} GROUP BY namespace",
            self.table
        ))
        .fetch_all(&self.pool)
        .await?;

        let mut namespaces = HashMap::new();
        let mut total_entries = 0;
        let mut total_bytes = 0;
        for (namespace, entries, bytes) in rows {
            let entries = entries as u64;
            let bytes = bytes as u64;
            total_entries += entries;
            total_bytes += bytes;
            namespaces.insert(
                namespace,
                NamespaceStats {
                    entries,
                    total_bytes: bytes,
                },
            );
        }

        Ok(MemoryStats {
            namespaces,
            total_entries,
            total_bytes,
            cache: crate::domain::models::CacheStats::default(),
        })
    }
}

#[derive(sqlx::FromRow)]
struct MemoryRow {
    key: String,
    namespace: String,
    value: String,
    value_format: String,
    entry_type: String,
    confidence: f64,
    created_by: String,
    compressed: i64,
    size: i64,
    ttl_seconds: Option<i64>,
    expires_at: Option<i64>,
    access_count: i64,
    tags: String,
    metadata: String,
    created_at: String,
    accessed_at: String,
}

impl TryFrom<MemoryRow> for MemoryEntry {
    type Error = HiveError;

    fn try_from(row: MemoryRow) -> Result<Self, Self::Error> {
        let value = MemoryValue::deserialize(&row.value, row.value_format == "json")?;

        Ok(MemoryEntry {
            key: row.key,
            namespace: row.namespace,
            value,
            entry_type: MemoryEntryType::from_str(&row.entry_type)
                .ok_or_else(|| HiveError::Storage(format!("bad entry type: {}", row.entry_type)))?,
            confidence: row.confidence,
            created_by: row.created_by,
            compressed: row.compressed != 0,
            size: row.size.max(0) as u64,
            ttl_seconds: row.ttl_seconds.map(|t| t.max(0) as u64),
            expires_at_epoch: row.expires_at,
            access_count: row.access_count.max(0) as u64,
            tags: serde_json::from_str(&row.tags)?,
            metadata: serde_json::from_str(&row.metadata)?,
            created_at: parse_ts(&row.created_at)?,
            accessed_at: parse_ts(&row.accessed_at)?,
        })
    }
}
