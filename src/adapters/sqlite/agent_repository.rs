//! SQLite implementation of the AgentRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::domain::errors::{HiveError, HiveResult};
use crate::domain::models::{Agent, AgentMetrics, AgentRole, AgentStatus, WorkerType};
use crate::domain::ports::AgentRepository;

use super::swarm_repository::{parse_ts, parse_uuid};

#[derive(Clone)]
pub struct SqliteAgentRepository {
    pool: SqlitePool,
}

impl SqliteAgentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AgentRepository for SqliteAgentRepository {
    async fn create(&self, agent: &Agent) -> HiveResult<()> {
        let capabilities: Vec<&String> = agent.capabilities.iter().collect();
        let current_tasks: Vec<String> =
            agent.current_tasks.iter().map(Uuid::to_string).collect();
        sqlx::query(
            "INSERT INTO agents (id, swarm_id, name, agent_type, role, status, capabilities,
             current_tasks, workload, metrics, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(agent.id.to_string())
        .bind(agent.swarm_id.to_string())
        .bind(&agent.name)
        .bind(agent.worker_type.map_or("queen", |t| t.as_str()))
        .bind(agent.role.as_str())
        .bind(agent.status.as_str())
        .bind(serde_json::to_string(&capabilities)?)
        .bind(serde_json::to_string(&current_tasks)?)
        .bind(agent.workload)
        .bind(serde_json::to_string(&agent.metrics)?)
        .bind(agent.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> HiveResult<Option<Agent>> {
        let row: Option<AgentRow> = sqlx::query_as("SELECT * FROM agents WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn update(&self, agent: &Agent) -> HiveResult<()> {
        let capabilities: Vec<&String> = agent.capabilities.iter().collect();
        let current_tasks: Vec<String> =
            agent.current_tasks.iter().map(Uuid::to_string).collect();
        let result = sqlx::query(
            "UPDATE agents SET name = ?, agent_type = ?, role = ?, status = ?, capabilities = ?,
             current_tasks = ?, workload = ?, metrics = ? WHERE id = ?",
        )
        .bind(&agent.name)
        .bind(agent.worker_type.map_or("queen", |t| t.as_str()))
        .bind(agent.role.as_str())
        .bind(agent.status.as_str())
        .bind(serde_json::to_string(&capabilities)?)
        .bind(serde_json::to_string(&current_tasks)?)
        .bind(agent.workload)
        .bind(serde_json::to_string(&agent.metrics)?)
        .bind(agent.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(HiveError::AgentNotFound(agent.id.to_string()));
        }
        Ok(())
    }

    async fn list_by_swarm(
        &self,
        swarm_id: Uuid,
        status: Option<AgentStatus>,
    ) -> HiveResult<Vec<Agent>> {
        let rows: Vec<AgentRow> = match status {
            Some(status) => {
                sqlx::query_as(
                    "SELECT * FROM agents WHERE swarm_id = ? AND status = ? ORDER BY id",
                )
                .bind(swarm_id.to_string())
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as("SELECT * FROM agents WHERE swarm_id = ? ORDER BY id")
                    .bind(swarm_id.to_string())
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn count_by_swarm(&self, swarm_id: Uuid) -> HiveResult<u64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM agents WHERE swarm_id = ?")
            .bind(swarm_id.to_string())
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}

#[derive(sqlx::FromRow)]
struct AgentRow {
    id: String,
    swarm_id: String,
    name: String,
    agent_type: String,
    role: String,
    status: String,
    capabilities: String,
    current_tasks: String,
    workload: f64,
    metrics: String,
    created_at: String,
}

impl TryFrom<AgentRow> for Agent {
    type Error = HiveError;

    fn try_from(row: AgentRow) -> Result<Self, Self::Error> {
        let capabilities: BTreeSet<String> = serde_json::from_str::<Vec<String>>(&row.capabilities)?
            .into_iter()
            .collect();
        let current_tasks: Vec<Uuid> = serde_json::from_str::<Vec<String>>(&row.current_tasks)?
            .iter()
            .map(|s| parse_uuid(s))
            .collect::<HiveResult<_>>()?;
        let metrics: AgentMetrics = serde_json::from_str(&row.metrics)?;
        let role = AgentRole::from_str(&row.role)
            .ok_or_else(|| HiveError::Storage(format!("bad agent role: {}", row.role)))?;
        let worker_type = match role {
            AgentRole::Queen => None,
            AgentRole::Worker => Some(WorkerType::from_str(&row.agent_type).ok_or_else(|| {
                HiveError::Storage(format!("bad worker type: {}", row.agent_type))
            })?),
        };

        Ok(Agent {
            id: parse_uuid(&row.id)?,
            swarm_id: parse_uuid(&row.swarm_id)?,
            name: row.name,
            worker_type,
            role,
            status: AgentStatus::from_str(&row.status)
                .ok_or_else(|| HiveError::Storage(format!("bad agent status: {}", row.status)))?,
            capabilities,
            current_tasks,
            workload: row.workload,
            metrics,
            created_at: parse_ts(&row.created_at)?,
        })
    }
}
