//! Process pool for hook execution.
//!
//! A bounded pool of reusable worker subprocesses. The worker binary is
//! whatever the integrator configures; it must read one command line per
//! hook from stdin and print the `HOOK_EXECUTION_COMPLETE` sentinel when
//! done (optionally `HOOK_EXECUTION_COMPLETE:<code>` to report a non-zero
//! result). The default worker is a shell line-echo loop, enough to
//! exercise the protocol end to end.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::errors::{HiveError, HiveResult};
use crate::domain::models::{HookArgs, HookOutput, HookType};
use crate::domain::ports::HookRunner;

/// Line a worker prints when a hook command is done.
pub const COMPLETION_SENTINEL: &str = "HOOK_EXECUTION_COMPLETE";

#[derive(Debug, Clone)]
pub struct ProcessPoolConfig {
    pub min_size: usize,
    pub max_size: usize,
    pub idle_timeout: Duration,
    pub acquire_poll: Duration,
    /// How long after SIGTERM before a worker is SIGKILLed.
    pub term_grace: Duration,
    pub worker_command: String,
    pub worker_args: Vec<String>,
}

impl Default for ProcessPoolConfig {
    fn default() -> Self {
        Self {
            min_size: 1,
            max_size: 3,
            idle_timeout: Duration::from_secs(30),
            acquire_poll: Duration::from_millis(100),
            term_grace: Duration::from_secs(5),
            worker_command: "sh".to_string(),
            worker_args: vec![
                "-c".to_string(),
                format!(
                    "while IFS= read -r line; do echo \"$line\"; echo {COMPLETION_SENTINEL}; done"
                ),
            ],
        }
    }
}

/// A checked-out worker process.
#[derive(Debug)]
pub struct PoolWorker {
    pub id: Uuid,
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    stderr_buf: Arc<std::sync::Mutex<String>>,
    _stderr_reader: JoinHandle<()>,
}

impl PoolWorker {
    fn pid(&self) -> Option<i32> {
        self.child.id().map(|pid| pid as i32)
    }

    /// SIGTERM, wait for the grace period, then SIGKILL.
    async fn terminate(mut self, grace: Duration) {
        if let Some(pid) = self.pid() {
            let _ = signal::kill(Pid::from_raw(pid), Signal::SIGTERM);
        }
        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(_) => {}
            Err(_) => {
                warn!(worker = %self.id, "worker ignored SIGTERM, killing");
                let _ = self.child.kill().await;
            }
        }
    }
}

#[derive(Debug)]
struct PoolState {
    idle: HashMap<Uuid, (PoolWorker, JoinHandle<()>)>,
    live: usize,
}

#[derive(Debug)]
struct PoolInner {
    config: ProcessPoolConfig,
    state: Mutex<PoolState>,
}

/// Bounded pool of reusable hook worker processes.
#[derive(Clone, Debug)]
pub struct ProcessPool {
    inner: Arc<PoolInner>,
}

impl ProcessPool {
    /// Create the pool and eagerly spawn `min_size` workers. Failing to
    /// spawn even one worker at startup is fatal.
    pub async fn new(config: ProcessPoolConfig) -> HiveResult<Self> {
        let pool = Self {
            inner: Arc::new(PoolInner {
                config,
                state: Mutex::new(PoolState {
                    idle: HashMap::new(),
                    live: 0,
                }),
            }),
        };
        pool.warm_up().await?;
        Ok(pool)
    }

    async fn warm_up(&self) -> HiveResult<()> {
        for _ in 0..self.inner.config.min_size.max(1) {
            let worker = self.spawn_worker().await?;
            let mut state = self.inner.state.lock().await;
            state.live += 1;
            let timer = self.start_idle_timer(worker.id);
            state.idle.insert(worker.id, (worker, timer));
        }
        Ok(())
    }

    async fn spawn_worker(&self) -> HiveResult<PoolWorker> {
        let mut child = Command::new(&self.inner.config.worker_command)
            .args(&self.inner.config.worker_args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                HiveError::ProcessPool(format!(
                    "failed to spawn worker '{}': {e}",
                    self.inner.config.worker_command
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| HiveError::ProcessPool("worker has no stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| HiveError::ProcessPool("worker has no stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| HiveError::ProcessPool("worker has no stderr".to_string()))?;

        let stderr_buf = Arc::new(std::sync::Mutex::new(String::new()));
        let stderr_sink = stderr_buf.clone();
        let stderr_reader = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let mut buf = stderr_sink.lock().expect("stderr buffer poisoned");
                buf.push_str(&line);
                buf.push('\n');
            }
        });

        let worker = PoolWorker {
            id: Uuid::new_v4(),
            child,
            stdin,
            stdout: BufReader::new(stdout),
            stderr_buf,
            _stderr_reader: stderr_reader,
        };
        debug!(worker = %worker.id, "worker spawned");
        Ok(worker)
    }

    /// Take a worker: reuse an idle one, spawn below the cap, otherwise
    /// poll until a handle frees up.
    pub async fn acquire(&self) -> HiveResult<PoolWorker> {
        loop {
            {
                let mut state = self.inner.state.lock().await;
                if let Some(id) = state.idle.keys().next().copied() {
                    let (worker, timer) = state.idle.remove(&id).expect("idle entry vanished");
                    timer.abort();
                    return Ok(worker);
                }
                if state.live < self.inner.config.max_size {
                    state.live += 1;
                    drop(state);
                    match self.spawn_worker().await {
                        Ok(worker) => return Ok(worker),
                        Err(e) => {
                            self.inner.state.lock().await.live -= 1;
                            return Err(e);
                        }
                    }
                }
            }
            tokio::time::sleep(self.inner.config.acquire_poll).await;
        }
    }

    /// Return a worker to the pool (restarting its idle timer) or
    /// terminate it when the pool is full.
    pub async fn release(&self, worker: PoolWorker) {
        let mut state = self.inner.state.lock().await;
        if state.idle.len() < self.inner.config.max_size {
            let timer = self.start_idle_timer(worker.id);
            state.idle.insert(worker.id, (worker, timer));
        } else {
            state.live = state.live.saturating_sub(1);
            drop(state);
            worker.terminate(self.inner.config.term_grace).await;
        }
    }

    /// Discard a worker that errored or timed out.
    async fn discard(&self, worker: PoolWorker) {
        {
            let mut state = self.inner.state.lock().await;
            state.live = state.live.saturating_sub(1);
        }
        worker.terminate(self.inner.config.term_grace).await;
    }

    fn start_idle_timer(&self, worker_id: Uuid) -> JoinHandle<()> {
        let pool = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(pool.inner.config.idle_timeout).await;
            let worker = {
                let mut state = pool.inner.state.lock().await;
                match state.idle.remove(&worker_id) {
                    Some((worker, _)) => {
                        state.live = state.live.saturating_sub(1);
                        Some(worker)
                    }
                    None => None,
                }
            };
            if let Some(worker) = worker {
                debug!(worker = %worker_id, "idle timeout, terminating worker");
                worker.terminate(pool.inner.config.term_grace).await;
            }
        })
    }

    /// Execute one hook on a pooled worker under the hook type's timeout.
    pub async fn execute_hook(
        &self,
        hook_type: HookType,
        args: &HookArgs,
    ) -> HiveResult<HookOutput> {
        let mut worker = self.acquire().await?;
        let command_line = format!("hook {}{}\n", hook_type.as_str(), args.to_command_tail());
        let started = std::time::Instant::now();

        let run = async {
            worker
                .stdin
                .write_all(command_line.as_bytes())
                .await
                .map_err(|e| HiveError::ProcessPool(format!("write to worker failed: {e}")))?;
            worker
                .stdin
                .flush()
                .await
                .map_err(|e| HiveError::ProcessPool(format!("flush to worker failed: {e}")))?;

            let mut stdout = String::new();
            let mut exit_code = 0;
            loop {
                let mut line = String::new();
                let read = worker
                    .stdout
                    .read_line(&mut line)
                    .await
                    .map_err(|e| HiveError::ProcessPool(format!("read from worker failed: {e}")))?;
                if read == 0 {
                    return Err(HiveError::ProcessPool(
                        "worker closed stdout before completion".to_string(),
                    ));
                }
                let trimmed = line.trim_end();
                if let Some(rest) = trimmed.strip_prefix(COMPLETION_SENTINEL) {
                    exit_code = rest
                        .strip_prefix(':')
                        .and_then(|c| c.parse().ok())
                        .unwrap_or(0);
                    break;
                }
                stdout.push_str(&line);
            }
            Ok::<(String, i32), HiveError>((stdout, exit_code))
        };

        match tokio::time::timeout(hook_type.timeout(), run).await {
            Ok(Ok((stdout, exit_code))) => {
                let stderr = worker
                    .stderr_buf
                    .lock()
                    .expect("stderr buffer poisoned")
                    .clone();
                let output = HookOutput {
                    stdout,
                    stderr: stderr.clone(),
                    exit_code,
                    duration: started.elapsed(),
                };
                self.release(worker).await;
                if exit_code != 0 {
                    return Err(HiveError::ProcessPool(format!(
                        "{hook_type} exited with code {exit_code}: {stderr}"
                    )));
                }
                Ok(output)
            }
            Ok(Err(err)) => {
                self.discard(worker).await;
                Err(err)
            }
            Err(_) => {
                // Timed-out workers are mid-command and can't be reused.
                self.discard(worker).await;
                Err(HiveError::HookTimeout {
                    hook_type,
                    timeout_ms: hook_type.timeout().as_millis() as u64,
                })
            }
        }
    }

    /// Terminate everything and respawn the minimum worker set.
    pub async fn reinitialize(&self) -> HiveResult<()> {
        self.shutdown().await;
        self.warm_up().await
    }

    /// Clear timers, SIGTERM all pooled workers, SIGKILL stragglers.
    pub async fn shutdown(&self) {
        let workers: Vec<PoolWorker> = {
            let mut state = self.inner.state.lock().await;
            state.live = 0;
            state
                .idle
                .drain()
                .map(|(_, (worker, timer))| {
                    timer.abort();
                    worker
                })
                .collect()
        };
        let count = workers.len();
        for worker in workers {
            worker.terminate(self.inner.config.term_grace).await;
        }
        if count > 0 {
            info!(count, "process pool shut down");
        }
    }

    /// Live worker count (idle + checked out).
    pub async fn live_count(&self) -> usize {
        self.inner.state.lock().await.live
    }

    /// Idle worker count.
    pub async fn idle_count(&self) -> usize {
        self.inner.state.lock().await.idle.len()
    }
}

#[async_trait::async_trait]
impl HookRunner for ProcessPool {
    async fn run(&self, hook_type: HookType, args: &HookArgs) -> HiveResult<HookOutput> {
        self.execute_hook(hook_type, args).await
    }
}
