//! Swarm repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::HiveResult;
use crate::domain::models::{Swarm, SwarmStatus};

/// Repository interface for Swarm persistence.
#[async_trait]
pub trait SwarmRepository: Send + Sync {
    /// Insert a new swarm.
    async fn create(&self, swarm: &Swarm) -> HiveResult<()>;

    /// Get a swarm by id.
    async fn get(&self, id: Uuid) -> HiveResult<Option<Swarm>>;

    /// Update an existing swarm.
    async fn update(&self, swarm: &Swarm) -> HiveResult<()>;

    /// List swarms, optionally filtered by status.
    async fn list(&self, status: Option<SwarmStatus>) -> HiveResult<Vec<Swarm>>;
}
