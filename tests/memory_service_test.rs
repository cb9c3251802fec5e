mod common;

use std::sync::Arc;

use serde_json::json;

use common::setup_swarm_store;
use hivemind::adapters::sqlite::SqliteMemoryRepository;
use hivemind::domain::models::{MemorySearch, MemoryValue};
use hivemind::services::{EventBus, MemoryEvent, SharedMemory, StoreOptions};

fn service_over(store: &hivemind::Store) -> SharedMemory {
    let repo = Arc::new(SqliteMemoryRepository::new(store.pool().clone()));
    SharedMemory::new(repo, EventBus::new())
}

#[tokio::test]
async fn test_text_round_trip() {
    let store = setup_swarm_store().await;
    let memory = service_over(&store);

    memory
        .store("greeting", MemoryValue::from("hello hive"), StoreOptions::default())
        .await
        .expect("store failed");

    let value = memory
        .retrieve("greeting", "default")
        .await
        .expect("retrieve failed")
        .expect("entry missing");
    assert_eq!(value, MemoryValue::from("hello hive"));
}

#[tokio::test]
async fn test_structured_round_trip() {
    let store = setup_swarm_store().await;
    let memory = service_over(&store);

    let payload = json!({"plan": ["analyze", "build"], "confidence": 0.9});
    memory
        .store("plan", MemoryValue::from(payload.clone()), StoreOptions::default())
        .await
        .expect("store failed");

    let value = memory
        .retrieve("plan", "default")
        .await
        .expect("retrieve failed")
        .expect("entry missing");
    assert_eq!(value, MemoryValue::Json(payload));
}

#[tokio::test]
async fn test_round_trip_survives_compression_marker() {
    let store = setup_swarm_store().await;
    let memory = service_over(&store);

    let big = "x".repeat(64 * 1024);
    let entry = memory
        .store("blob", MemoryValue::from(big.clone()), StoreOptions::default())
        .await
        .expect("store failed");
    assert!(entry.compressed, "64 KiB should exceed the threshold");

    let value = memory
        .retrieve("blob", "default")
        .await
        .expect("retrieve failed")
        .expect("entry missing");
    assert_eq!(value, MemoryValue::from(big));
}

#[tokio::test]
async fn test_upsert_replaces_value() {
    let store = setup_swarm_store().await;
    let memory = service_over(&store);

    memory
        .store("k", MemoryValue::from("one"), StoreOptions::default())
        .await
        .unwrap();
    memory
        .store("k", MemoryValue::from("two"), StoreOptions::default())
        .await
        .unwrap();

    let value = memory.retrieve("k", "default").await.unwrap().unwrap();
    assert_eq!(value, MemoryValue::from("two"));
}

#[tokio::test]
async fn test_namespaces_are_isolated() {
    let store = setup_swarm_store().await;
    let memory = service_over(&store);

    memory
        .store("k", MemoryValue::from("a"), StoreOptions::default().namespace("alpha"))
        .await
        .unwrap();
    memory
        .store("k", MemoryValue::from("b"), StoreOptions::default().namespace("beta"))
        .await
        .unwrap();

    assert_eq!(
        memory.retrieve("k", "alpha").await.unwrap().unwrap(),
        MemoryValue::from("a")
    );
    assert_eq!(
        memory.retrieve("k", "beta").await.unwrap().unwrap(),
        MemoryValue::from("b")
    );
    assert!(memory.retrieve("k", "default").await.unwrap().is_none());
}

#[tokio::test]
async fn test_ttl_expiry_and_gc() {
    let store = setup_swarm_store().await;
    let repo = Arc::new(SqliteMemoryRepository::new(store.pool().clone()));
    let events = EventBus::new();
    let memory = SharedMemory::new(repo, events.clone());
    let mut rx = events.subscribe_memory();

    memory
        .store(
            "ephemeral",
            MemoryValue::from("v"),
            StoreOptions::default().ttl_seconds(1),
        )
        .await
        .unwrap();

    tokio::time::sleep(std::time::Duration::from_secs(2)).await;

    // Expired entries are invisible to reads.
    assert!(memory.retrieve("ephemeral", "default").await.unwrap().is_none());

    // Re-store and let the GC reap it instead.
    memory
        .store(
            "ephemeral",
            MemoryValue::from("v"),
            StoreOptions::default().ttl_seconds(1),
        )
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_secs(2)).await;
    let cleaned = memory.gc().await.unwrap();
    assert_eq!(cleaned, 1);

    // The gc event reports the count.
    let mut saw_gc = false;
    while let Ok(event) = rx.try_recv() {
        if let MemoryEvent::GcCompleted { cleaned, .. } = event {
            if cleaned == 1 {
                saw_gc = true;
            }
        }
    }
    assert!(saw_gc, "expected a gc event with cleaned=1");
}

#[tokio::test]
async fn test_entries_without_ttl_survive_gc() {
    let store = setup_swarm_store().await;
    let memory = service_over(&store);

    memory
        .store("stable", MemoryValue::from("v"), StoreOptions::default())
        .await
        .unwrap();
    assert_eq!(memory.gc().await.unwrap(), 0);
    assert!(memory.retrieve("stable", "default").await.unwrap().is_some());
}

#[tokio::test]
async fn test_search_by_pattern_and_tags() {
    let store = setup_swarm_store().await;
    let memory = service_over(&store);

    memory
        .store(
            "task:1:result",
            MemoryValue::from("a"),
            StoreOptions::default().tags(vec!["result".into()]),
        )
        .await
        .unwrap();
    memory
        .store(
            "task:2:result",
            MemoryValue::from("b"),
            StoreOptions::default().tags(vec!["result".into(), "final".into()]),
        )
        .await
        .unwrap();
    memory
        .store("unrelated", MemoryValue::from("c"), StoreOptions::default())
        .await
        .unwrap();

    let hits = memory
        .search(&MemorySearch::new().pattern("task:*:result"))
        .await
        .unwrap();
    assert_eq!(hits.len(), 2);

    let tagged = memory
        .search(&MemorySearch::new().with_tag("final"))
        .await
        .unwrap();
    assert_eq!(tagged.len(), 1);
    assert_eq!(tagged[0].key, "task:2:result");
}

#[tokio::test]
async fn test_delete_and_clear() {
    let store = setup_swarm_store().await;
    let memory = service_over(&store);

    for key in ["a", "b", "c"] {
        memory
            .store(key, MemoryValue::from("v"), StoreOptions::default().namespace("scratch"))
            .await
            .unwrap();
    }

    assert!(memory.delete("a", "scratch").await.unwrap());
    assert!(!memory.delete("a", "scratch").await.unwrap());
    assert_eq!(memory.clear("scratch").await.unwrap(), 2);
    assert!(memory.retrieve("b", "scratch").await.unwrap().is_none());
}

#[tokio::test]
async fn test_stats_count_namespaces_and_cache() {
    let store = setup_swarm_store().await;
    let memory = service_over(&store);

    memory
        .store("a", MemoryValue::from("1234"), StoreOptions::default().namespace("ns1"))
        .await
        .unwrap();
    memory
        .store("b", MemoryValue::from("12345678"), StoreOptions::default().namespace("ns2"))
        .await
        .unwrap();

    memory.retrieve("a", "ns1").await.unwrap();
    memory.retrieve("missing", "ns1").await.unwrap();

    let stats = memory.stats().await.unwrap();
    assert_eq!(stats.total_entries, 2);
    assert_eq!(stats.namespaces["ns1"].entries, 1);
    assert_eq!(stats.namespaces["ns2"].total_bytes, 8);
    assert!(stats.cache.hits >= 1);
    assert!(stats.cache.misses >= 1);
}

#[tokio::test]
async fn test_access_count_increments() {
    let store = setup_swarm_store().await;
    let memory = service_over(&store);

    memory
        .store("hot", MemoryValue::from("v"), StoreOptions::default())
        .await
        .unwrap();
    for _ in 0..3 {
        memory.retrieve("hot", "default").await.unwrap();
    }

    let entries = memory.list("default", 10, 0).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].access_count >= 3, "got {}", entries[0].access_count);
}
