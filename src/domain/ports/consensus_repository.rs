//! Consensus repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::HiveResult;
use crate::domain::models::ConsensusDecision;

/// Repository interface for consensus decision persistence.
///
/// `update` writes the full votes map and result in one atomic statement so
/// every non-pending transition is durable as a unit.
#[async_trait]
pub trait ConsensusRepository: Send + Sync {
    /// Insert a new decision.
    async fn create(&self, decision: &ConsensusDecision) -> HiveResult<()>;

    /// Get a decision by id.
    async fn get(&self, id: Uuid) -> HiveResult<Option<ConsensusDecision>>;

    /// Persist the decision's votes, result, and confidence atomically.
    async fn update(&self, decision: &ConsensusDecision) -> HiveResult<()>;

    /// List recent decisions, newest first.
    async fn list_recent(&self, swarm_id: Option<Uuid>, limit: usize)
        -> HiveResult<Vec<ConsensusDecision>>;

    /// Count decisions, optionally per swarm.
    async fn count(&self, swarm_id: Option<Uuid>) -> HiveResult<u64>;
}
