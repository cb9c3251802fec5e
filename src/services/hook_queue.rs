//! Hook queue: a single in-process priority queue of hook invocations.
//!
//! Exactly one worker drains the queue, so hook execution is globally
//! serialized per queue instance. That single-flighting is the deadlock
//! prevention invariant: a hook can never wait on another hook that is
//! itself waiting on the first.
//!
//! Each attempt runs under the hook type's hard timeout. Failures other
//! than validation retry with linear backoff up to the attempt cap.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::errors::{HiveError, HiveResult};
use crate::domain::models::{HookArgs, HookOutput, HookPriority, HookTask, HookType};
use crate::domain::ports::HookRunner;
use crate::services::event_bus::{EventBus, HookEvent};

const STATS_WINDOW: usize = 100;

#[derive(Debug, Clone)]
pub struct HookQueueConfig {
    /// Total attempts per task, including the first.
    pub max_attempts: u32,
    /// Linear backoff base; retry n sleeps `base * n`.
    pub backoff_base: Duration,
}

impl Default for HookQueueConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_millis(100),
        }
    }
}

/// Sliding-window execution stats for one hook type.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct HookTypeStats {
    pub count: u64,
    pub success_count: u64,
    pub failure_count: u64,
    #[serde(skip)]
    durations: VecDeque<Duration>,
}

impl HookTypeStats {
    pub fn success_rate(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.success_count as f64 / self.count as f64
    }

    pub fn min_duration(&self) -> Option<Duration> {
        self.durations.iter().min().copied()
    }

    pub fn max_duration(&self) -> Option<Duration> {
        self.durations.iter().max().copied()
    }

    pub fn avg_duration(&self) -> Option<Duration> {
        if self.durations.is_empty() {
            return None;
        }
        let total: Duration = self.durations.iter().sum();
        Some(total / self.durations.len() as u32)
    }

    fn record(&mut self, success: bool, duration: Duration) {
        self.count += 1;
        if success {
            self.success_count += 1;
        } else {
            self.failure_count += 1;
        }
        self.durations.push_back(duration);
        while self.durations.len() > STATS_WINDOW {
            self.durations.pop_front();
        }
    }
}

struct QueueItem {
    task: HookTask,
    seq: u64,
    result_tx: oneshot::Sender<HiveResult<HookOutput>>,
}

impl QueueItem {
    fn order(&self) -> (u8, u64) {
        (self.task.priority as u8, self.seq)
    }
}

impl PartialEq for QueueItem {
    fn eq(&self, other: &Self) -> bool {
        self.order() == other.order()
    }
}
impl Eq for QueueItem {}
impl PartialOrd for QueueItem {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for QueueItem {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.order().cmp(&other.order())
    }
}

/// Handle to an enqueued hook; resolves when the run finishes.
pub struct HookTicket {
    pub task_id: Uuid,
    rx: oneshot::Receiver<HiveResult<HookOutput>>,
}

impl HookTicket {
    pub async fn wait(self) -> HiveResult<HookOutput> {
        self.rx.await.unwrap_or(Err(HiveError::QueueCleared))
    }
}

struct QueueState {
    // Reverse turns the max-heap into "smallest (priority, seq) first",
    // i.e. high priority then FIFO.
    heap: Mutex<BinaryHeap<Reverse<QueueItem>>>,
    wakeup: Notify,
    seq: AtomicU64,
    running: AtomicUsize,
    stats: Mutex<HashMap<HookType, HookTypeStats>>,
    shutdown: Notify,
}

/// The hook queue. Cloning shares the same queue and worker.
#[derive(Clone)]
pub struct HookQueue {
    state: Arc<QueueState>,
    runner: Arc<dyn HookRunner>,
    config: HookQueueConfig,
    events: EventBus,
    worker: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl HookQueue {
    pub fn new(runner: Arc<dyn HookRunner>, events: EventBus) -> Self {
        Self::with_config(runner, events, HookQueueConfig::default())
    }

    pub fn with_config(
        runner: Arc<dyn HookRunner>,
        events: EventBus,
        config: HookQueueConfig,
    ) -> Self {
        let state = Arc::new(QueueState {
            heap: Mutex::new(BinaryHeap::new()),
            wakeup: Notify::new(),
            seq: AtomicU64::new(0),
            running: AtomicUsize::new(0),
            stats: Mutex::new(HashMap::new()),
            shutdown: Notify::new(),
        });

        let queue = Self {
            state,
            runner,
            config,
            events,
            worker: Arc::new(Mutex::new(None)),
        };

        let worker_handle = tokio::spawn(queue.clone().drain_loop());
        *queue.worker.lock().expect("worker lock poisoned") = Some(worker_handle);
        queue
    }

    /// Enqueue a hook invocation and get a ticket for its result.
    pub fn enqueue(&self, hook_type: HookType, args: HookArgs, priority: HookPriority) -> HookTicket {
        let task = HookTask::new(hook_type, args, priority);
        let task_id = task.id;
        let (result_tx, rx) = oneshot::channel();
        let seq = self.state.seq.fetch_add(1, Ordering::SeqCst);

        self.events.publish_hook(HookEvent::Queued {
            task_id,
            hook_type,
            priority,
        });

        self.state
            .heap
            .lock()
            .expect("queue lock poisoned")
            .push(Reverse(QueueItem {
                task,
                seq,
                result_tx,
            }));
        self.state.wakeup.notify_one();

        HookTicket { task_id, rx }
    }

    /// Drain the queue, rejecting every waiting task with a cleared error.
    /// The task currently running (if any) is allowed to finish.
    pub fn emergency_clear(&self) -> usize {
        let drained: Vec<QueueItem> = {
            let mut heap = self.state.heap.lock().expect("queue lock poisoned");
            std::mem::take(&mut *heap)
                .into_sorted_vec()
                .into_iter()
                .map(|Reverse(item)| item)
                .collect()
        };
        let count = drained.len();
        for item in drained {
            let _ = item.result_tx.send(Err(HiveError::QueueCleared));
        }
        if count > 0 {
            warn!(count, "hook queue emergency-cleared");
        }
        count
    }

    /// Number of tasks waiting (not counting a running one).
    pub fn pending_len(&self) -> usize {
        self.state.heap.lock().expect("queue lock poisoned").len()
    }

    /// How many tasks are executing right now; never exceeds 1.
    pub fn running_count(&self) -> usize {
        self.state.running.load(Ordering::SeqCst)
    }

    /// Snapshot of per-type stats.
    pub fn stats(&self) -> HashMap<HookType, HookTypeStats> {
        self.state.stats.lock().expect("stats lock poisoned").clone()
    }

    /// Log one aggregate line per hook type with recorded runs.
    pub fn log_metrics(&self) {
        let stats = self.stats();
        for (hook_type, s) in &stats {
            if s.count == 0 {
                continue;
            }
            info!(
                hook_type = %hook_type,
                count = s.count,
                success_rate = format!("{:.0}%", s.success_rate() * 100.0),
                avg_ms = s.avg_duration().map_or(0, |d| d.as_millis()),
                "hook metrics"
            );
        }
    }

    /// Stop the worker after the current task finishes and reject the rest.
    pub async fn shutdown(&self) {
        self.state.shutdown.notify_waiters();
        self.state.wakeup.notify_one();
        let handle = self.worker.lock().expect("worker lock poisoned").take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        self.emergency_clear();
    }

    async fn drain_loop(self) {
        loop {
            let item = {
                let mut heap = self.state.heap.lock().expect("queue lock poisoned");
                heap.pop().map(|Reverse(item)| item)
            };

            match item {
                Some(item) => self.execute_item(item).await,
                None => {
                    tokio::select! {
                        () = self.state.wakeup.notified() => {}
                        () = self.state.shutdown.notified() => return,
                    }
                }
            }
        }
    }

    async fn execute_item(&self, mut item: QueueItem) {
        self.state.running.store(1, Ordering::SeqCst);
        let hook_type = item.task.hook_type;
        let timeout = hook_type.timeout();
        let started = std::time::Instant::now();
        let mut last_error: Option<HiveError> = None;

        while item.task.attempt < self.config.max_attempts {
            item.task.attempt += 1;
            let attempt = item.task.attempt;
            self.events.publish_hook(HookEvent::Started {
                task_id: item.task.id,
                hook_type,
                attempt,
            });

            let attempt_started = std::time::Instant::now();
            let outcome = tokio::time::timeout(timeout, self.runner.run(hook_type, &item.task.args))
                .await
                .map_err(|_| HiveError::HookTimeout {
                    hook_type,
                    timeout_ms: timeout.as_millis() as u64,
                })
                .and_then(|r| r);
            let duration = attempt_started.elapsed();

            match outcome {
                Ok(output) => {
                    self.record(hook_type, true, duration);
                    self.events.publish_hook(HookEvent::Completed {
                        task_id: item.task.id,
                        hook_type,
                        duration_ms: started.elapsed().as_millis() as u64,
                    });
                    let _ = item.result_tx.send(Ok(output));
                    self.state.running.store(0, Ordering::SeqCst);
                    return;
                }
                Err(err) if err.is_validation() => {
                    // Validation never retries.
                    self.record(hook_type, false, duration);
                    self.events.publish_hook(HookEvent::Failed {
                        task_id: item.task.id,
                        hook_type,
                        attempts: attempt,
                        error: err.to_string(),
                    });
                    let _ = item.result_tx.send(Err(err));
                    self.state.running.store(0, Ordering::SeqCst);
                    return;
                }
                Err(err) => {
                    debug!(%hook_type, attempt, error = %err, "hook attempt failed");
                    if attempt < self.config.max_attempts {
                        self.events.publish_hook(HookEvent::Retried {
                            task_id: item.task.id,
                            hook_type,
                            attempt,
                            error: err.to_string(),
                        });
                        tokio::time::sleep(self.config.backoff_base * attempt).await;
                    }
                    last_error = Some(err);
                }
            }
        }

        let attempts = item.task.attempt;
        let last_error = last_error
            .map_or_else(|| "unknown error".to_string(), |e| e.to_string());
        self.record(hook_type, false, started.elapsed());
        self.events.publish_hook(HookEvent::Failed {
            task_id: item.task.id,
            hook_type,
            attempts,
            error: last_error.clone(),
        });
        let _ = item.result_tx.send(Err(HiveError::RetriesExhausted {
            hook_type,
            attempts,
            last_error,
        }));
        self.state.running.store(0, Ordering::SeqCst);
    }

    fn record(&self, hook_type: HookType, success: bool, duration: Duration) {
        self.state
            .stats
            .lock()
            .expect("stats lock poisoned")
            .entry(hook_type)
            .or_default()
            .record(success, duration);
    }
}
