//! Hook coordinator: the deadlock-prevention layer above the hook queue.
//!
//! A coordinated hook passes through: deadlock check → lock wait → dep wait
//! → running → {completed, failed} → released. Failure at any earlier stage
//! still releases whatever was partially held.
//!
//! Locks and execution records are process-local; the lock TTL bounds how
//! long a crashed holder can wedge a resource.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{HiveError, HiveResult};
use crate::domain::models::{
    default_hook_graph, has_cycle, CoordinationLock, HookArgs, HookExecution,
    HookExecutionStatus, HookGraph, HookOutput, HookPriority, HookType,
};
use crate::services::hook_queue::HookQueue;
use crate::services::process_pool::ProcessPool;

#[derive(Debug, Clone)]
pub struct HookCoordinatorConfig {
    /// Reject when this many hooks run concurrently and one would be blocked.
    pub max_concurrent_hooks: usize,
    pub lock_ttl: chrono::Duration,
    /// Linear backoff base for lock acquisition (`base * attempt`).
    pub lock_retry_base: Duration,
    pub lock_max_attempts: u32,
    pub dependency_wait: Duration,
    pub dependency_poll: Duration,
    /// Executions older than this are reaped by the cleanup loop.
    pub execution_staleness: chrono::Duration,
}

impl HookCoordinatorConfig {
    /// Override the concurrent-hook cap (the `HIVE_MAX_CONCURRENT_HOOKS`
    /// setting).
    pub fn with_max_concurrent_hooks(mut self, max: usize) -> Self {
        self.max_concurrent_hooks = max.max(1);
        self
    }
}

impl Default for HookCoordinatorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_hooks: 3,
            lock_ttl: chrono::Duration::seconds(30),
            lock_retry_base: Duration::from_millis(50),
            lock_max_attempts: 10,
            dependency_wait: Duration::from_secs(30),
            dependency_poll: Duration::from_millis(100),
            execution_staleness: chrono::Duration::minutes(5),
        }
    }
}

/// Per-call options for `coordinate`.
#[derive(Debug, Clone, Default)]
pub struct CoordinateOptions {
    /// Queue priority; defaults to the graph's per-type priority.
    pub priority: Option<HookPriority>,
    /// Overall deadline on queue wait + execution.
    pub timeout: Option<Duration>,
}

struct CoordinatorState {
    locks: Mutex<HashMap<String, CoordinationLock>>,
    executions: Mutex<HashMap<Uuid, HookExecution>>,
}

/// Schedules coordinated hook executions over the queue.
#[derive(Clone)]
pub struct HookCoordinator {
    graph: Arc<HookGraph>,
    config: HookCoordinatorConfig,
    state: Arc<CoordinatorState>,
    queue: HookQueue,
    pool: Option<Arc<ProcessPool>>,
}

impl HookCoordinator {
    pub fn new(queue: HookQueue) -> Self {
        Self::with_graph(queue, default_hook_graph(), HookCoordinatorConfig::default())
    }

    /// Construct with an explicit graph and config; the graph is immutable
    /// afterwards. Tests substitute degenerate graphs here.
    pub fn with_graph(queue: HookQueue, graph: HookGraph, config: HookCoordinatorConfig) -> Self {
        Self {
            graph: Arc::new(graph),
            config,
            state: Arc::new(CoordinatorState {
                locks: Mutex::new(HashMap::new()),
                executions: Mutex::new(HashMap::new()),
            }),
            queue,
            pool: None,
        }
    }

    /// Attach the process pool so `emergency_reset` can reinitialize it.
    pub fn with_pool(mut self, pool: Arc<ProcessPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Run one hook through the full coordination pipeline.
    #[instrument(skip(self, args, options), fields(hook = %hook_type))]
    pub async fn coordinate(
        &self,
        hook_type: HookType,
        args: HookArgs,
        options: CoordinateOptions,
    ) -> HiveResult<HookOutput> {
        // Stage 1: deadlock checks, before anything is held.
        if has_cycle(&self.graph, hook_type) {
            return Err(HiveError::CircularDependency(hook_type));
        }
        self.check_would_block(hook_type)?;

        // Stage 2: advisory lock keyed by hook type.
        let lock_id = self.acquire_lock(hook_type).await?;

        // Stage 3: register the execution record.
        let deps = self
            .graph
            .get(&hook_type)
            .map(|d| d.depends_on.clone())
            .unwrap_or_default();
        let execution = HookExecution::new(hook_type, std::process::id(), deps.clone());
        let exec_id = execution.exec_id;
        self.state
            .executions
            .lock()
            .expect("executions lock poisoned")
            .insert(exec_id, execution);

        // Stage 4: wait until every dependency is satisfied.
        if let Err(err) = self.wait_for_dependencies(&deps).await {
            self.remove_execution(exec_id);
            self.release_lock(hook_type, lock_id);
            return Err(err);
        }

        // Stage 5: execute through the queue.
        self.set_execution_status(exec_id, HookExecutionStatus::Running);
        let priority = options.priority.unwrap_or_else(|| {
            self.graph
                .get(&hook_type)
                .map(|d| d.priority)
                .unwrap_or_default()
        });
        let ticket = self.queue.enqueue(hook_type, args, priority);
        let result = match options.timeout {
            Some(limit) => match tokio::time::timeout(limit, ticket.wait()).await {
                Ok(result) => result,
                Err(_) => Err(HiveError::HookTimeout {
                    hook_type,
                    timeout_ms: limit.as_millis() as u64,
                }),
            },
            None => ticket.wait().await,
        };

        let final_status = if result.is_ok() {
            HookExecutionStatus::Completed
        } else {
            HookExecutionStatus::Failed
        };
        self.set_execution_status(exec_id, final_status);

        // Stage 6: release. Completed records stay for dependency checks
        // until the cleanup loop reaps them.
        if final_status == HookExecutionStatus::Failed {
            self.remove_execution(exec_id);
        }
        self.release_lock(hook_type, lock_id);
        result
    }

    /// Reject when the concurrent-hook cap is hit and any running hook is a
    /// type this hook would block.
    fn check_would_block(&self, hook_type: HookType) -> HiveResult<()> {
        let executions = self
            .state
            .executions
            .lock()
            .expect("executions lock poisoned");
        let running: Vec<HookType> = executions
            .values()
            .filter(|e| e.status == HookExecutionStatus::Running)
            .map(|e| e.hook_type)
            .collect();

        if running.len() >= self.config.max_concurrent_hooks {
            let blocks_one = running.iter().any(|r| {
                self.graph
                    .get(r)
                    .is_some_and(|d| d.blocked_by.contains(&hook_type))
            });
            if blocks_one {
                return Err(HiveError::WouldBlock {
                    hook_type,
                    running: running.len(),
                });
            }
        }
        Ok(())
    }

    /// Acquire the advisory lock for `hook_type` with bounded linear backoff.
    async fn acquire_lock(&self, hook_type: HookType) -> HiveResult<Uuid> {
        let resource_key = hook_type.as_str().to_string();
        for attempt in 1..=self.config.lock_max_attempts {
            {
                let mut locks = self.state.locks.lock().expect("locks lock poisoned");
                let now = Utc::now();
                let reclaimable = match locks.get(&resource_key) {
                    None => true,
                    Some(existing) => existing.is_expired_at(now),
                };
                if reclaimable {
                    let lock =
                        CoordinationLock::new(&resource_key, hook_type, self.config.lock_ttl);
                    let lock_id = lock.lock_id;
                    locks.insert(resource_key.clone(), lock);
                    debug!(resource = %resource_key, %lock_id, attempt, "lock acquired");
                    return Ok(lock_id);
                }
            }
            tokio::time::sleep(self.config.lock_retry_base * attempt).await;
        }

        Err(HiveError::LockAcquireFailed {
            resource: resource_key,
            attempts: self.config.lock_max_attempts,
        })
    }

    /// Remove the lock only if it is still ours.
    fn release_lock(&self, hook_type: HookType, lock_id: Uuid) {
        let mut locks = self.state.locks.lock().expect("locks lock poisoned");
        if let Some(existing) = locks.get(hook_type.as_str()) {
            if existing.lock_id == lock_id {
                locks.remove(hook_type.as_str());
            }
        }
    }

    /// Poll until every dependency type has a completed execution or is not
    /// currently running.
    async fn wait_for_dependencies(&self, deps: &[HookType]) -> HiveResult<()> {
        if deps.is_empty() {
            return Ok(());
        }
        let deadline = tokio::time::Instant::now() + self.config.dependency_wait;
        loop {
            if self.dependencies_satisfied(deps) {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(HiveError::DependencyTimeout(deps[0]));
            }
            tokio::time::sleep(self.config.dependency_poll).await;
        }
    }

    fn dependencies_satisfied(&self, deps: &[HookType]) -> bool {
        let executions = self
            .state
            .executions
            .lock()
            .expect("executions lock poisoned");
        deps.iter().all(|dep| {
            let mut completed = false;
            let mut running = false;
            for execution in executions.values() {
                if execution.hook_type == *dep {
                    match execution.status {
                        HookExecutionStatus::Completed => completed = true,
                        HookExecutionStatus::Running => running = true,
                        _ => {}
                    }
                }
            }
            completed || !running
        })
    }

    fn set_execution_status(&self, exec_id: Uuid, status: HookExecutionStatus) {
        let mut executions = self
            .state
            .executions
            .lock()
            .expect("executions lock poisoned");
        if let Some(execution) = executions.get_mut(&exec_id) {
            execution.status = status;
        }
    }

    fn remove_execution(&self, exec_id: Uuid) {
        self.state
            .executions
            .lock()
            .expect("executions lock poisoned")
            .remove(&exec_id);
    }

    /// One cleanup pass: drop expired locks and stale execution records.
    pub fn cleanup(&self) {
        let now = Utc::now();
        {
            let mut locks = self.state.locks.lock().expect("locks lock poisoned");
            let before = locks.len();
            locks.retain(|_, lock| !lock.is_expired_at(now));
            let removed = before - locks.len();
            if removed > 0 {
                debug!(removed, "expired locks reaped");
            }
        }
        {
            let mut executions = self
                .state
                .executions
                .lock()
                .expect("executions lock poisoned");
            let before = executions.len();
            executions.retain(|_, e| !e.is_stale(now, self.config.execution_staleness));
            let removed = before - executions.len();
            if removed > 0 {
                debug!(removed, "stale executions reaped");
            }
        }
    }

    /// Release every lock, clear pending executions, drain the queue, and
    /// reinitialize the process pool.
    pub async fn emergency_reset(&self) -> HiveResult<()> {
        warn!("hook coordinator emergency reset");
        self.state
            .locks
            .lock()
            .expect("locks lock poisoned")
            .clear();
        self.state
            .executions
            .lock()
            .expect("executions lock poisoned")
            .clear();
        let cleared = self.queue.emergency_clear();
        if let Some(pool) = &self.pool {
            pool.reinitialize().await?;
        }
        info!(cleared, "emergency reset complete");
        Ok(())
    }

    /// Number of live (non-expired) locks.
    pub fn active_locks(&self) -> usize {
        let now = Utc::now();
        self.state
            .locks
            .lock()
            .expect("locks lock poisoned")
            .values()
            .filter(|l| !l.is_expired_at(now))
            .count()
    }

    /// Number of execution records currently tracked.
    pub fn pending_executions(&self) -> usize {
        self.state
            .executions
            .lock()
            .expect("executions lock poisoned")
            .len()
    }

    pub fn queue(&self) -> &HookQueue {
        &self.queue
    }
}
