//! Task domain model.
//!
//! Tasks are the units of work an orchestrator dispatches to agents. They
//! form a tree by id (`parent_task_id` / `subtask_ids`) and a DAG through
//! typed dependencies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a task in the execution pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting for dependencies or an agent.
    Queued,
    /// Assigned and executing.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
    /// Cancelled before completion.
    Cancelled,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Queued
    }
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "queued" => Some(Self::Queued),
            "running" => Some(Self::Running),
            "completed" | "complete" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Valid transitions from this status.
    pub fn valid_transitions(&self) -> &'static [TaskStatus] {
        match self {
            Self::Queued => &[Self::Running, Self::Cancelled],
            Self::Running => &[Self::Completed, Self::Failed, Self::Cancelled],
            Self::Completed | Self::Failed | Self::Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }
}

/// Precedence relation between a task and one of its dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DependencyKind {
    /// Dependent may start once the dependency has finished (default).
    FinishToStart,
    /// Dependent may start once the dependency has started.
    StartToStart,
    /// Dependent may finish once the dependency has finished.
    FinishToFinish,
    /// Dependent may finish once the dependency has started.
    StartToFinish,
}

impl Default for DependencyKind {
    fn default() -> Self {
        Self::FinishToStart
    }
}

impl DependencyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FinishToStart => "finish-to-start",
            Self::StartToStart => "start-to-start",
            Self::FinishToFinish => "finish-to-finish",
            Self::StartToFinish => "start-to-finish",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "finish-to-start" => Some(Self::FinishToStart),
            "start-to-start" => Some(Self::StartToStart),
            "finish-to-finish" => Some(Self::FinishToFinish),
            "start-to-finish" => Some(Self::StartToFinish),
            _ => None,
        }
    }
}

/// A typed, lagged dependency on another task in the same swarm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDependency {
    pub task_id: Uuid,
    #[serde(default)]
    pub kind: DependencyKind,
    /// Milliseconds the gate is delayed after the relation is satisfied.
    #[serde(default)]
    pub lag_ms: u64,
}

impl TaskDependency {
    pub fn new(task_id: Uuid) -> Self {
        Self {
            task_id,
            kind: DependencyKind::FinishToStart,
            lag_ms: 0,
        }
    }

    pub fn with_kind(mut self, kind: DependencyKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_lag_ms(mut self, lag_ms: u64) -> Self {
        self.lag_ms = lag_ms;
        self
    }
}

/// Units of a named resource a task claims while running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequirement {
    pub resource: String,
    pub amount: u64,
}

/// Optional scheduling window for a task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSchedule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_before: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
}

/// Structured task annotations.
///
/// Enumerated fields replace a free-form metadata bag; anything the caller
/// wants to carry opaquely goes into `payload` untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskMetadata {
    /// Capability tags an executing agent must cover.
    #[serde(default)]
    pub required_capabilities: Vec<String>,
    /// Result summary recorded on completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<serde_json::Value>,
    /// Reason recorded on cancellation or failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Opaque caller payload, stored verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

/// A discrete unit of work within a swarm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub swarm_id: Uuid,
    pub assigned_agent_id: Option<Uuid>,
    pub parent_task_id: Option<Uuid>,
    pub subtask_ids: Vec<Uuid>,
    pub dependencies: Vec<TaskDependency>,
    pub description: String,
    pub task_type: String,
    /// Priority in [1, 10]; higher runs first.
    pub priority: u8,
    pub status: TaskStatus,
    /// Progress in [0, 100].
    pub progress: u8,
    pub resource_requirements: Vec<ResourceRequirement>,
    pub schedule: Option<TaskSchedule>,
    pub tags: Vec<String>,
    pub metadata: TaskMetadata,
    /// When the task entered `running`.
    pub started_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a new queued task.
    pub fn new(swarm_id: Uuid, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            swarm_id,
            assigned_agent_id: None,
            parent_task_id: None,
            subtask_ids: Vec::new(),
            dependencies: Vec::new(),
            description: description.into(),
            task_type: "standard".to_string(),
            priority: 5,
            status: TaskStatus::Queued,
            progress: 0,
            resource_requirements: Vec::new(),
            schedule: None,
            tags: Vec::new(),
            metadata: TaskMetadata::default(),
            started_at: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_parent(mut self, parent_task_id: Uuid) -> Self {
        self.parent_task_id = Some(parent_task_id);
        self
    }

    pub fn with_dependency(mut self, dep: TaskDependency) -> Self {
        self.dependencies.push(dep);
        self
    }

    pub fn with_resource(mut self, resource: impl Into<String>, amount: u64) -> Self {
        self.resource_requirements.push(ResourceRequirement {
            resource: resource.into(),
            amount,
        });
        self
    }

    pub fn with_capabilities(mut self, tags: Vec<String>) -> Self {
        self.metadata.required_capabilities = tags;
        self
    }

    /// Validate intrinsic fields (dependency existence is the orchestrator's job).
    pub fn validate(&self) -> Result<(), String> {
        if self.description.trim().is_empty() {
            return Err("Task description cannot be empty".to_string());
        }
        if !(1..=10).contains(&self.priority) {
            return Err(format!("Task priority must be in [1, 10], got {}", self.priority));
        }
        Ok(())
    }

    /// Transition to a new status, keeping the progress/completed_at invariants.
    pub fn transition(&mut self, new_status: TaskStatus) -> Result<(), String> {
        if !self.status.can_transition_to(new_status) {
            return Err(format!(
                "invalid task transition {} -> {}",
                self.status.as_str(),
                new_status.as_str()
            ));
        }
        let now = Utc::now();
        match new_status {
            TaskStatus::Running => self.started_at = Some(now),
            TaskStatus::Completed => {
                self.progress = 100;
                self.completed_at = Some(now);
            }
            TaskStatus::Failed | TaskStatus::Cancelled => self.completed_at = Some(now),
            TaskStatus::Queued => {}
        }
        self.status = new_status;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_task_defaults() {
        let task = Task::new(Uuid::new_v4(), "do it");
        assert_eq!(task.status, TaskStatus::Queued);
        assert_eq!(task.progress, 0);
        assert_eq!(task.priority, 5);
    }

    #[test]
    fn test_completion_sets_progress_and_timestamp() {
        let mut task = Task::new(Uuid::new_v4(), "do it");
        task.transition(TaskStatus::Running).unwrap();
        task.transition(TaskStatus::Completed).unwrap();
        assert_eq!(task.progress, 100);
        assert!(task.completed_at.is_some());
        assert!(task.started_at.is_some());
    }

    #[test]
    fn test_terminal_states_reject_transitions() {
        let mut task = Task::new(Uuid::new_v4(), "do it");
        task.transition(TaskStatus::Cancelled).unwrap();
        assert!(task.transition(TaskStatus::Running).is_err());
    }

    #[test]
    fn test_queued_cannot_jump_to_completed() {
        let mut task = Task::new(Uuid::new_v4(), "do it");
        assert!(task.transition(TaskStatus::Completed).is_err());
    }

    #[test]
    fn test_priority_bounds() {
        let task = Task::new(Uuid::new_v4(), "x").with_priority(0);
        assert!(task.validate().is_err());
        let task = Task::new(Uuid::new_v4(), "x").with_priority(11);
        assert!(task.validate().is_err());
        let task = Task::new(Uuid::new_v4(), "x").with_priority(10);
        assert!(task.validate().is_ok());
    }

    #[test]
    fn test_dependency_kind_roundtrip() {
        for kind in [
            DependencyKind::FinishToStart,
            DependencyKind::StartToStart,
            DependencyKind::FinishToFinish,
            DependencyKind::StartToFinish,
        ] {
            assert_eq!(DependencyKind::from_str(kind.as_str()), Some(kind));
        }
    }
}
