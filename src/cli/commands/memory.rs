//! `memory` commands over the shared memory store.

use anyhow::{Context, Result};
use comfy_table::{presets::UTF8_FULL_CONDENSED, Table};
use serde::Serialize;

use crate::cli::output::{output, truncate, CommandOutput};
use crate::cli::{HiveContext, MemoryCommands};
use crate::domain::models::{MemoryEntry, MemorySearch, MemoryValue};
use crate::services::StoreOptions;

#[derive(Debug, Serialize)]
struct EntryLine {
    key: String,
    namespace: String,
    entry_type: String,
    size: u64,
    compressed: bool,
    access_count: u64,
    ttl_seconds: Option<u64>,
    preview: String,
}

impl EntryLine {
    fn from_entry(entry: &MemoryEntry) -> Self {
        let preview = match &entry.value {
            MemoryValue::Text(s) => truncate(s, 40),
            MemoryValue::Json(v) => truncate(&v.to_string(), 40),
        };
        Self {
            key: entry.key.clone(),
            namespace: entry.namespace.clone(),
            entry_type: entry.entry_type.as_str().to_string(),
            size: entry.size,
            compressed: entry.compressed,
            access_count: entry.access_count,
            ttl_seconds: entry.ttl_seconds,
            preview,
        }
    }
}

#[derive(Debug, Serialize)]
struct EntryListOutput {
    entries: Vec<EntryLine>,
}

impl CommandOutput for EntryListOutput {
    fn to_human(&self) -> String {
        if self.entries.is_empty() {
            return "No memory entries found.".to_string();
        }
        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED).set_header(vec![
            "Key", "Namespace", "Type", "Size", "Accesses", "TTL", "Value",
        ]);
        for e in &self.entries {
            table.add_row(vec![
                truncate(&e.key, 24),
                truncate(&e.namespace, 16),
                e.entry_type.clone(),
                e.size.to_string(),
                e.access_count.to_string(),
                e.ttl_seconds
                    .map_or_else(|| "-".to_string(), |t| format!("{t}s")),
                e.preview.clone(),
            ]);
        }
        table.to_string()
    }
}

#[derive(Debug, Serialize)]
struct StoredOutput {
    key: String,
    namespace: String,
    size: u64,
    compressed: bool,
    expires_at_epoch: Option<i64>,
}

impl CommandOutput for StoredOutput {
    fn to_human(&self) -> String {
        format!(
            "Stored {}/{} ({} bytes{}{})",
            self.namespace,
            self.key,
            self.size,
            if self.compressed { ", compressed" } else { "" },
            self.expires_at_epoch
                .map(|t| format!(", expires at epoch {t}"))
                .unwrap_or_default(),
        )
    }
}

#[derive(Debug, Serialize)]
struct StatsOutput {
    total_entries: u64,
    total_bytes: u64,
    namespaces: Vec<(String, u64, u64)>,
    cache_hits: u64,
    cache_misses: u64,
    cache_evictions: u64,
}

impl CommandOutput for StatsOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![format!(
            "Memory: {} entries, {} bytes",
            self.total_entries, self.total_bytes
        )];
        for (ns, entries, bytes) in &self.namespaces {
            lines.push(format!("  {ns}: {entries} entries, {bytes} bytes"));
        }
        lines.push(format!(
            "Cache: {} hits, {} misses, {} evictions",
            self.cache_hits, self.cache_misses, self.cache_evictions
        ));
        lines.join("\n")
    }
}

#[derive(Debug, Serialize)]
struct CleanOutput {
    cleaned: u64,
}

impl CommandOutput for CleanOutput {
    fn to_human(&self) -> String {
        format!("Cleaned {} expired entr(ies)", self.cleaned)
    }
}

#[derive(Debug, Serialize)]
struct ExportOutput {
    file: String,
    entries: usize,
}

impl CommandOutput for ExportOutput {
    fn to_human(&self) -> String {
        format!("Exported {} entr(ies) to {}", self.entries, self.file)
    }
}

pub async fn handle_memory(ctx: &HiveContext, command: MemoryCommands, json: bool) -> Result<()> {
    match command {
        MemoryCommands::Store {
            key,
            value,
            namespace,
            ttl,
            tags,
        } => {
            // Values that parse as JSON objects/arrays are stored
            // structured; everything else is passthrough text.
            let value = match serde_json::from_str::<serde_json::Value>(&value) {
                Ok(v) if v.is_object() || v.is_array() => MemoryValue::Json(v),
                _ => MemoryValue::Text(value),
            };
            let mut options = StoreOptions::default().namespace(namespace).tags(tags);
            if let Some(ttl) = ttl {
                options = options.ttl_seconds(ttl);
            }
            let entry = ctx.memory.store(&key, value, options).await?;
            output(
                &StoredOutput {
                    key: entry.key,
                    namespace: entry.namespace,
                    size: entry.size,
                    compressed: entry.compressed,
                    expires_at_epoch: entry.expires_at_epoch,
                },
                json,
            );
        }
        MemoryCommands::List {
            namespace,
            limit,
            offset,
        } => {
            let entries = ctx.memory.list(&namespace, limit, offset).await?;
            output(
                &EntryListOutput {
                    entries: entries.iter().map(EntryLine::from_entry).collect(),
                },
                json,
            );
        }
        MemoryCommands::Search {
            pattern,
            namespace,
            tags,
            limit,
        } => {
            let mut search = MemorySearch::new().pattern(pattern).limit(limit);
            if let Some(ns) = namespace {
                search = search.namespace(ns);
            }
            for tag in tags {
                search = search.with_tag(tag);
            }
            let entries = ctx.memory.search(&search).await?;
            output(
                &EntryListOutput {
                    entries: entries.iter().map(EntryLine::from_entry).collect(),
                },
                json,
            );
        }
        MemoryCommands::Stats => {
            let stats = ctx.memory.stats().await?;
            let mut namespaces: Vec<(String, u64, u64)> = stats
                .namespaces
                .iter()
                .map(|(ns, s)| (ns.clone(), s.entries, s.total_bytes))
                .collect();
            namespaces.sort();
            output(
                &StatsOutput {
                    total_entries: stats.total_entries,
                    total_bytes: stats.total_bytes,
                    namespaces,
                    cache_hits: stats.cache.hits,
                    cache_misses: stats.cache.misses,
                    cache_evictions: stats.cache.evictions,
                },
                json,
            );
        }
        MemoryCommands::Clean => {
            let cleaned = ctx.memory.gc().await?;
            output(&CleanOutput { cleaned }, json);
        }
        MemoryCommands::Export { file, namespace } => {
            let entries = match namespace {
                Some(ns) => ctx.memory.list(&ns, usize::MAX >> 1, 0).await?,
                None => {
                    let stats = ctx.memory.stats().await?;
                    let mut all = Vec::new();
                    for ns in stats.namespaces.keys() {
                        all.extend(ctx.memory.list(ns, usize::MAX >> 1, 0).await?);
                    }
                    all
                }
            };
            let body = serde_json::to_string_pretty(&entries)?;
            std::fs::write(&file, body)
                .with_context(|| format!("Failed to write {file}"))?;
            output(
                &ExportOutput {
                    file,
                    entries: entries.len(),
                },
                json,
            );
        }
    }
    Ok(())
}
