//! SQLite implementation of the TaskRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::errors::{HiveError, HiveResult};
use crate::domain::models::{
    ResourceRequirement, Task, TaskDependency, TaskMetadata, TaskSchedule, TaskStatus,
};
use crate::domain::ports::{TaskFilter, TaskRepository};

use super::swarm_repository::{parse_ts, parse_uuid};

#[derive(Clone)]
pub struct SqliteTaskRepository {
    pool: SqlitePool,
}

impl SqliteTaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskRepository for SqliteTaskRepository {
    async fn create(&self, task: &Task) -> HiveResult<()> {
        sqlx::query(
            "INSERT INTO tasks (id, swarm_id, assigned_agent_id, parent_task_id, subtask_ids,
             dependencies, description, task_type, priority, status, progress,
             resource_requirements, schedule, tags, metadata, started_at, created_at, completed_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(task.id.to_string())
        .bind(task.swarm_id.to_string())
        .bind(task.assigned_agent_id.map(|id| id.to_string()))
        .bind(task.parent_task_id.map(|id| id.to_string()))
        .bind(serde_json::to_string(
            &task.subtask_ids.iter().map(Uuid::to_string).collect::<Vec<_>>(),
        )?)
        .bind(serde_json::to_string(&task.dependencies)?)
        .bind(&task.description)
        .bind(&task.task_type)
        .bind(i64::from(task.priority))
        .bind(task.status.as_str())
        .bind(i64::from(task.progress))
        .bind(serde_json::to_string(&task.resource_requirements)?)
        .bind(task.schedule.as_ref().map(serde_json::to_string).transpose()?)
        .bind(serde_json::to_string(&task.tags)?)
        .bind(serde_json::to_string(&task.metadata)?)
        .bind(task.started_at.map(|t| t.to_rfc3339()))
        .bind(task.created_at.to_rfc3339())
        .bind(task.completed_at.map(|t| t.to_rfc3339()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> HiveResult<Option<Task>> {
        let row: Option<TaskRow> = sqlx::query_as("SELECT * FROM tasks WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn update(&self, task: &Task) -> HiveResult<()> {
        let result = sqlx::query(
            "UPDATE tasks SET assigned_agent_id = ?, parent_task_id = ?, subtask_ids = ?,
             dependencies = ?, description = ?, task_type = ?, priority = ?, status = ?,
             progress = ?, resource_requirements = ?, schedule = ?, tags = ?, metadata = ?,
             started_at = ?, completed_at = ? WHERE id = ?",
        )
        .bind(task.assigned_agent_id.map(|id| id.to_string()))
        .bind(task.parent_task_id.map(|id| id.to_string()))
        .bind(serde_json::to_string(
            &task.subtask_ids.iter().map(Uuid::to_string).collect::<Vec<_>>(),
        )?)
        .bind(serde_json::to_string(&task.dependencies)?)
        .bind(&task.description)
        .bind(&task.task_type)
        .bind(i64::from(task.priority))
        .bind(task.status.as_str())
        .bind(i64::from(task.progress))
        .bind(serde_json::to_string(&task.resource_requirements)?)
        .bind(task.schedule.as_ref().map(serde_json::to_string).transpose()?)
        .bind(serde_json::to_string(&task.tags)?)
        .bind(serde_json::to_string(&task.metadata)?)
        .bind(task.started_at.map(|t| t.to_rfc3339()))
        .bind(task.completed_at.map(|t| t.to_rfc3339()))
        .bind(task.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(HiveError::TaskNotFound(task.id.to_string()));
        }
        Ok(())
    }

    async fn list(&self, filter: &TaskFilter) -> HiveResult<Vec<Task>> {
        let mut sql = String::from("SELECT * FROM tasks WHERE 1=1");
        let mut bindings: Vec<String> = Vec::new();

        if let Some(swarm_id) = filter.swarm_id {
            sql.push_str(" AND swarm_id = ?");
            bindings.push(swarm_id.to_string());
        }
        if let Some(status) = filter.status {
            sql.push_str(" AND status = ?");
            bindings.push(status.as_str().to_string());
        }
        if let Some(agent_id) = filter.assigned_agent_id {
            sql.push_str(" AND assigned_agent_id = ?");
            bindings.push(agent_id.to_string());
        }
        sql.push_str(" ORDER BY created_at DESC");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let mut query = sqlx::query_as::<_, TaskRow>(&sql);
        for binding in &bindings {
            query = query.bind(binding);
        }
        let rows: Vec<TaskRow> = query.fetch_all(&self.pool).await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn status_counts(
        &self,
        swarm_id: Option<Uuid>,
    ) -> HiveResult<HashMap<TaskStatus, u64>> {
        let rows: Vec<(String, i64)> = match swarm_id {
            Some(swarm_id) => {
                sqlx::query_as(
                    "SELECT status, COUNT(*) FROM tasks WHERE swarm_id = ? GROUP BY status",
                )
                .bind(swarm_id.to_string())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as("SELECT status, COUNT(*) FROM tasks GROUP BY status")
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        let mut counts = HashMap::new();
        for (status, count) in rows {
            if let Some(status) = TaskStatus::from_str(&status) {
                counts.insert(status, count as u64);
            }
        }
        Ok(counts)
    }
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: String,
    swarm_id: String,
    assigned_agent_id: Option<String>,
    parent_task_id: Option<String>,
    subtask_ids: String,
    dependencies: String,
    description: String,
    task_type: String,
    priority: i64,
    status: String,
    progress: i64,
    resource_requirements: String,
    schedule: Option<String>,
    tags: String,
    metadata: String,
    started_at: Option<String>,
    created_at: String,
    completed_at: Option<String>,
}

impl TryFrom<TaskRow> for Task {
    type Error = HiveError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let subtask_ids: Vec<Uuid> = serde_json::from_str::<Vec<String>>(&row.subtask_ids)?
            .iter()
            .map(|s| parse_uuid(s))
            .collect::<HiveResult<_>>()?;
        let dependencies: Vec<TaskDependency> = serde_json::from_str(&row.dependencies)?;
        let resource_requirements: Vec<ResourceRequirement> =
            serde_json::from_str(&row.resource_requirements)?;
        let schedule: Option<TaskSchedule> = row
            .schedule
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;
        let metadata: TaskMetadata = serde_json::from_str(&row.metadata)?;

        Ok(Task {
            id: parse_uuid(&row.id)?,
            swarm_id: parse_uuid(&row.swarm_id)?,
            assigned_agent_id: row.assigned_agent_id.as_deref().map(parse_uuid).transpose()?,
            parent_task_id: row.parent_task_id.as_deref().map(parse_uuid).transpose()?,
            subtask_ids,
            dependencies,
            description: row.description,
            task_type: row.task_type,
            priority: row.priority.clamp(1, 10) as u8,
            status: TaskStatus::from_str(&row.status)
                .ok_or_else(|| HiveError::Storage(format!("bad task status: {}", row.status)))?,
            progress: row.progress.clamp(0, 100) as u8,
            resource_requirements,
            schedule,
            tags: serde_json::from_str(&row.tags)?,
            metadata,
            started_at: row.started_at.as_deref().map(parse_ts).transpose()?,
            created_at: parse_ts(&row.created_at)?,
            completed_at: row.completed_at.as_deref().map(parse_ts).transpose()?,
        })
    }
}
