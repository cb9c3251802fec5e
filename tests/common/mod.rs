//! Shared test fixtures: in-memory stores and scriptable hook runners.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use hivemind::adapters::sqlite::{hive_migrations, swarm_migrations, Migrator, Store};
use hivemind::domain::errors::{HiveError, HiveResult};
use hivemind::domain::models::{HookArgs, HookOutput, HookType};
use hivemind::domain::ports::HookRunner;

/// In-memory store with the hive schema applied.
pub async fn setup_hive_store() -> Store {
    let store = Store::open_in_memory()
        .await
        .expect("failed to open in-memory store");
    Migrator::new(store.pool().clone())
        .run(&hive_migrations())
        .await
        .expect("failed to run hive migrations");
    store
}

/// In-memory store with the swarm schema applied.
pub async fn setup_swarm_store() -> Store {
    let store = Store::open_in_memory()
        .await
        .expect("failed to open in-memory store");
    Migrator::new(store.pool().clone())
        .run(&swarm_migrations())
        .await
        .expect("failed to run swarm migrations");
    store
}

/// Succeeds immediately, echoing the hook type.
pub struct EchoRunner;

#[async_trait]
impl HookRunner for EchoRunner {
    async fn run(&self, hook_type: HookType, _args: &HookArgs) -> HiveResult<HookOutput> {
        Ok(HookOutput {
            stdout: format!("ran {hook_type}\n"),
            stderr: String::new(),
            exit_code: 0,
            duration: Duration::from_millis(1),
        })
    }
}

/// Sleeps for a fixed delay, then succeeds.
pub struct SlowRunner {
    pub delay: Duration,
}

#[async_trait]
impl HookRunner for SlowRunner {
    async fn run(&self, _hook_type: HookType, _args: &HookArgs) -> HiveResult<HookOutput> {
        tokio::time::sleep(self.delay).await;
        Ok(HookOutput {
            exit_code: 0,
            duration: self.delay,
            ..HookOutput::default()
        })
    }
}

/// Fails the first `failures` attempts, then succeeds.
pub struct FlakyRunner {
    remaining_failures: AtomicU32,
}

impl FlakyRunner {
    pub fn new(failures: u32) -> Self {
        Self {
            remaining_failures: AtomicU32::new(failures),
        }
    }
}

#[async_trait]
impl HookRunner for FlakyRunner {
    async fn run(&self, hook_type: HookType, _args: &HookArgs) -> HiveResult<HookOutput> {
        let remaining = self.remaining_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.remaining_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(HiveError::ProcessPool(format!(
                "simulated transient failure for {hook_type}"
            )));
        }
        Ok(HookOutput {
            exit_code: 0,
            ..HookOutput::default()
        })
    }
}

/// Always fails with a validation error.
pub struct ValidationFailRunner;

#[async_trait]
impl HookRunner for ValidationFailRunner {
    async fn run(&self, hook_type: HookType, _args: &HookArgs) -> HiveResult<HookOutput> {
        Err(HiveError::ValidationFailed(format!(
            "bad arguments for {hook_type}"
        )))
    }
}

/// Tracks how many runs are active at once and the maximum ever observed.
pub struct ConcurrencyProbeRunner {
    active: AtomicUsize,
    pub max_seen: Arc<AtomicUsize>,
    pub total: Arc<AtomicUsize>,
    pub delay: Duration,
}

impl ConcurrencyProbeRunner {
    pub fn new(delay: Duration) -> Self {
        Self {
            active: AtomicUsize::new(0),
            max_seen: Arc::new(AtomicUsize::new(0)),
            total: Arc::new(AtomicUsize::new(0)),
            delay,
        }
    }
}

#[async_trait]
impl HookRunner for ConcurrencyProbeRunner {
    async fn run(&self, _hook_type: HookType, _args: &HookArgs) -> HiveResult<HookOutput> {
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_seen.fetch_max(now_active, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.total.fetch_add(1, Ordering::SeqCst);
        Ok(HookOutput {
            exit_code: 0,
            ..HookOutput::default()
        })
    }
}

/// Records the order hooks actually executed in.
pub struct OrderProbeRunner {
    pub order: Arc<std::sync::Mutex<Vec<(HookType, String)>>>,
}

impl OrderProbeRunner {
    pub fn new() -> Self {
        Self {
            order: Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl HookRunner for OrderProbeRunner {
    async fn run(&self, hook_type: HookType, args: &HookArgs) -> HiveResult<HookOutput> {
        self.order
            .lock()
            .expect("order probe poisoned")
            .push((hook_type, args.get("tag").unwrap_or("").to_string()));
        if let Some(delay_ms) = args.get("delay_ms").and_then(|d| d.parse().ok()) {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
        Ok(HookOutput {
            exit_code: 0,
            ..HookOutput::default()
        })
    }
}
