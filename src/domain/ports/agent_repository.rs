//! Agent repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::HiveResult;
use crate::domain::models::{Agent, AgentStatus};

/// Repository interface for Agent persistence.
#[async_trait]
pub trait AgentRepository: Send + Sync {
    /// Insert a new agent.
    async fn create(&self, agent: &Agent) -> HiveResult<()>;

    /// Get an agent by id.
    async fn get(&self, id: Uuid) -> HiveResult<Option<Agent>>;

    /// Update an existing agent.
    async fn update(&self, agent: &Agent) -> HiveResult<()>;

    /// List agents of a swarm, optionally filtered by status.
    async fn list_by_swarm(
        &self,
        swarm_id: Uuid,
        status: Option<AgentStatus>,
    ) -> HiveResult<Vec<Agent>>;

    /// Count agents per swarm across all swarms.
    async fn count_by_swarm(&self, swarm_id: Uuid) -> HiveResult<u64>;
}
