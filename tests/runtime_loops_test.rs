//! Wires the standard background loops (coordinator cleanup, memory GC,
//! queue metrics) through the Runtime and checks they tick and drain.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{setup_swarm_store, EchoRunner};
use hivemind::adapters::sqlite::SqliteMemoryRepository;
use hivemind::domain::models::MemoryValue;
use hivemind::services::{
    EventBus, HookCoordinator, HookQueue, MemoryEvent, Runtime, SharedMemory, StoreOptions,
};

#[tokio::test]
async fn test_standard_loops_tick_and_drain() {
    let store = setup_swarm_store().await;
    let repo = Arc::new(SqliteMemoryRepository::new(store.pool().clone()));
    let events = EventBus::new();
    let memory = Arc::new(SharedMemory::new(repo, events.clone()));
    let queue = HookQueue::new(Arc::new(EchoRunner), events.clone());
    let coordinator = HookCoordinator::new(queue.clone());

    // Seed something for the GC to reap.
    memory
        .store(
            "short-lived",
            MemoryValue::from("v"),
            StoreOptions::default().ttl_seconds(1),
        )
        .await
        .unwrap();

    let runtime = Runtime::new();
    // Intervals shrunk from their production values (10 s / 5 min / 30 s)
    // so the test observes a few ticks.
    {
        let coordinator = coordinator.clone();
        runtime.spawn_interval("coordinator-cleanup", Duration::from_millis(50), move || {
            let coordinator = coordinator.clone();
            async move { coordinator.cleanup() }
        });
    }
    {
        let memory = memory.clone();
        runtime.spawn_interval("memory-gc", Duration::from_millis(400), move || {
            let memory = memory.clone();
            async move {
                let _ = memory.gc().await;
            }
        });
    }
    {
        let queue = queue.clone();
        runtime.spawn_interval("queue-metrics", Duration::from_millis(50), move || {
            let queue = queue.clone();
            async move { queue.log_metrics() }
        });
    }

    let mut rx = events.subscribe_memory();
    tokio::time::sleep(Duration::from_secs(2)).await;
    runtime.shutdown().await;

    // The GC loop reaped the expired entry.
    assert!(
        memory.retrieve("short-lived", "default").await.unwrap().is_none(),
        "expired entry should be gone"
    );
    let mut reaped = 0;
    while let Ok(event) = rx.try_recv() {
        if let MemoryEvent::GcCompleted { cleaned, .. } = event {
            reaped += cleaned;
        }
    }
    assert_eq!(reaped, 1, "gc loop reported the reaped row");

    // Shutdown drained everything; no loop ticks again afterwards.
    while rx.try_recv().is_ok() {}
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(rx.try_recv().is_err(), "no gc events after shutdown");
}
