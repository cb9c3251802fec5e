//! Domain errors for the hivemind orchestrator.
//!
//! Variants follow the system's failure taxonomy: validation errors surface
//! unchanged, conflicts are caller decisions, timeouts and transient
//! failures are retried where bounded, deadlock-prevention rejections are
//! immediate. User-visible messages name the component and the condition.

use thiserror::Error;

use crate::domain::models::hook::HookType;

/// Domain-level errors that can occur in the hivemind system.
#[derive(Debug, Error)]
pub enum HiveError {
    #[error("Swarm not found: {0}")]
    SwarmNotFound(String),

    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Decision not found: {0}")]
    DecisionNotFound(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Consensus: duplicate vote from {voter_id} on decision {decision_id}")]
    DuplicateVote { decision_id: String, voter_id: String },

    #[error("HookCoordinator: circular dependency for {0}")]
    CircularDependency(HookType),

    #[error("HookCoordinator: {hook_type} would block {running} running hook(s)")]
    WouldBlock { hook_type: HookType, running: usize },

    #[error("HookCoordinator: dependency timeout for {0}")]
    DependencyTimeout(HookType),

    #[error("HookCoordinator: failed to acquire lock on {resource} after {attempts} attempts")]
    LockAcquireFailed { resource: String, attempts: u32 },

    #[error("HookQueue: {hook_type} timed out after {timeout_ms} ms")]
    HookTimeout { hook_type: HookType, timeout_ms: u64 },

    #[error("HookQueue: {hook_type} failed after {attempts} attempt(s): {last_error}")]
    RetriesExhausted {
        hook_type: HookType,
        attempts: u32,
        last_error: String,
    },

    #[error("HookQueue: cleared")]
    QueueCleared,

    #[error("ProcessPool: {0}")]
    ProcessPool(String),

    #[error("Orchestrator: unknown dependency {dependency_id} for task {task_id}")]
    UnknownDependency {
        task_id: String,
        dependency_id: String,
    },

    #[error(
        "Orchestrator: resource {resource} unavailable (requested {requested}, available {available})"
    )]
    ResourceUnavailable {
        resource: String,
        requested: u64,
        available: u64,
    },

    #[error("Orchestrator: unknown resource {0}")]
    UnknownResource(String),

    #[error("Store: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type HiveResult<T> = Result<T, HiveError>;

impl HiveError {
    /// Whether this error is a validation failure that must never be retried.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::ValidationFailed(_)
                | Self::UnknownDependency { .. }
                | Self::UnknownResource(_)
                | Self::ResourceUnavailable { .. }
                | Self::InvalidStateTransition { .. }
        )
    }
}

impl From<sqlx::Error> for HiveError {
    fn from(err: sqlx::Error) -> Self {
        HiveError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for HiveError {
    fn from(err: serde_json::Error) -> Self {
        HiveError::Serialization(err.to_string())
    }
}
