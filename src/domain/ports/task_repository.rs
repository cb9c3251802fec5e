//! Task repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::HiveResult;
use crate::domain::models::{Task, TaskStatus};

/// Filters for task listings.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub swarm_id: Option<Uuid>,
    pub status: Option<TaskStatus>,
    pub assigned_agent_id: Option<Uuid>,
    pub limit: Option<usize>,
}

/// Repository interface for Task persistence.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Insert a new task.
    async fn create(&self, task: &Task) -> HiveResult<()>;

    /// Get a task by id.
    async fn get(&self, id: Uuid) -> HiveResult<Option<Task>>;

    /// Update an existing task.
    async fn update(&self, task: &Task) -> HiveResult<()>;

    /// List tasks matching the filter, newest first.
    async fn list(&self, filter: &TaskFilter) -> HiveResult<Vec<Task>>;

    /// Status histogram for a swarm (or all swarms when `None`).
    async fn status_counts(
        &self,
        swarm_id: Option<Uuid>,
    ) -> HiveResult<std::collections::HashMap<TaskStatus, u64>>;
}
