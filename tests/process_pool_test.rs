//! Process pool tests against a real shell worker speaking the stdin/
//! sentinel protocol.

use std::time::Duration;

use hivemind::domain::errors::HiveError;
use hivemind::domain::models::{HookArgs, HookType};
use hivemind::services::{ProcessPool, ProcessPoolConfig, COMPLETION_SENTINEL};

fn echo_worker_config() -> ProcessPoolConfig {
    ProcessPoolConfig::default()
}

fn sleepy_worker_config() -> ProcessPoolConfig {
    // Reads a command, sleeps past every hook timeout, never completes.
    ProcessPoolConfig {
        worker_command: "sh".to_string(),
        worker_args: vec![
            "-c".to_string(),
            "while IFS= read -r line; do sleep 30; echo never; done".to_string(),
        ],
        ..ProcessPoolConfig::default()
    }
}

#[tokio::test]
async fn test_execute_hook_round_trip() {
    let pool = ProcessPool::new(echo_worker_config()).await.unwrap();
    let args = HookArgs::new().set("file", "src/lib.rs");
    let output = pool.execute_hook(HookType::PreEdit, &args).await.unwrap();

    assert_eq!(output.exit_code, 0);
    assert!(output.stdout.contains("hook pre-edit --file src/lib.rs"));
    assert!(!output.stdout.contains(COMPLETION_SENTINEL));
    pool.shutdown().await;
}

#[tokio::test]
async fn test_worker_is_reused_across_hooks() {
    let pool = ProcessPool::new(echo_worker_config()).await.unwrap();
    for _ in 0..5 {
        pool.execute_hook(HookType::Notify, &HookArgs::new())
            .await
            .unwrap();
    }
    assert_eq!(pool.live_count().await, 1, "one warm worker serves them all");
    pool.shutdown().await;
}

#[tokio::test]
async fn test_timeout_discards_worker() {
    let pool = ProcessPool::new(sleepy_worker_config()).await.unwrap();

    // pre-read has the tightest timeout (1 s).
    let err = pool
        .execute_hook(HookType::PreRead, &HookArgs::new())
        .await
        .expect_err("sleepy worker must time out");
    assert!(matches!(err, HiveError::HookTimeout { .. }));

    // The wedged worker was removed rather than returned to the pool.
    assert_eq!(pool.live_count().await, 0);
    pool.shutdown().await;
}

#[tokio::test]
async fn test_spawn_failure_is_fatal_at_startup() {
    let config = ProcessPoolConfig {
        worker_command: "/nonexistent/hook-worker".to_string(),
        worker_args: vec![],
        ..ProcessPoolConfig::default()
    };
    let err = ProcessPool::new(config).await.expect_err("spawn must fail");
    assert!(matches!(err, HiveError::ProcessPool(_)));
}

#[tokio::test]
async fn test_reinitialize_restores_min_size() {
    let pool = ProcessPool::new(echo_worker_config()).await.unwrap();
    pool.execute_hook(HookType::Notify, &HookArgs::new())
        .await
        .unwrap();
    pool.reinitialize().await.unwrap();
    assert_eq!(pool.live_count().await, 1);
    assert_eq!(pool.idle_count().await, 1);
    pool.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_empties_pool() {
    let pool = ProcessPool::new(echo_worker_config()).await.unwrap();
    pool.shutdown().await;
    assert_eq!(pool.live_count().await, 0);
    assert_eq!(pool.idle_count().await, 0);
}

#[tokio::test]
async fn test_sentinel_exit_code_surfaces_failure() {
    // A worker that reports a non-zero hook result via the sentinel.
    let config = ProcessPoolConfig {
        worker_command: "sh".to_string(),
        worker_args: vec![
            "-c".to_string(),
            format!(
                "while IFS= read -r line; do echo boom >&2; echo {COMPLETION_SENTINEL}:3; done"
            ),
        ],
        ..ProcessPoolConfig::default()
    };
    let pool = ProcessPool::new(config).await.unwrap();
    let err = pool
        .execute_hook(HookType::Notify, &HookArgs::new())
        .await
        .expect_err("non-zero sentinel code is a failure");
    match err {
        HiveError::ProcessPool(message) => {
            assert!(message.contains("code 3"), "got: {message}");
        }
        other => panic!("unexpected error: {other}"),
    }
    pool.shutdown().await;
}
