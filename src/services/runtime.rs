//! Background-loop runtime.
//!
//! One `Runtime` value owns every periodic loop in the process (coordinator
//! cleanup, memory GC, queue metrics). Shutdown signals all loops and joins
//! them, so nothing is left running when the process exits.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(10);
pub const GC_INTERVAL: Duration = Duration::from_secs(5 * 60);
pub const METRICS_INTERVAL: Duration = Duration::from_secs(30);

pub struct Runtime {
    shutdown_tx: watch::Sender<bool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Runtime {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            shutdown_tx,
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Spawn a named loop running `tick` every `period` until shutdown.
    pub fn spawn_interval<F, Fut>(&self, name: &'static str, period: Duration, tick: F)
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick of `interval` fires immediately; skip it so a
            // freshly started loop waits a full period first.
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        debug!(loop_name = name, "background tick");
                        tick().await;
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            debug!(loop_name = name, "background loop stopping");
                            return;
                        }
                    }
                }
            }
        });
        self.handles
            .lock()
            .expect("runtime handles poisoned")
            .push(handle);
    }

    /// Signal every loop and wait for all of them to drain.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        let handles: Vec<JoinHandle<()>> = self
            .handles
            .lock()
            .expect("runtime handles poisoned")
            .drain(..)
            .collect();
        let count = handles.len();
        for handle in handles {
            let _ = handle.await;
        }
        if count > 0 {
            info!(count, "background loops drained");
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}
