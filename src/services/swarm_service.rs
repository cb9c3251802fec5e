//! Swarm lifecycle service.
//!
//! Owns swarm and agent records: creation with validation, queen spawn,
//! worker spawn against the fixed capability table, pause/resume, and
//! cancellation cascading through the orchestrator.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::errors::{HiveError, HiveResult};
use crate::domain::models::{
    Agent, AgentStatus, ConsensusAlgorithm, QueenType, Swarm, SwarmConfig, SwarmStatus,
    WorkerType,
};
use crate::domain::ports::{AgentRepository, SwarmRepository};
use crate::services::event_bus::{EventBus, SwarmEvent};
use crate::services::orchestrator::Orchestrator;

/// Validated parameters for `init_swarm`.
#[derive(Debug, Clone)]
pub struct InitSwarmOptions {
    pub name: String,
    pub objective: String,
    pub queen_type: QueenType,
    pub max_workers: u32,
    pub consensus_algorithm: ConsensusAlgorithm,
    pub auto_scale: bool,
    pub encryption: bool,
}

pub struct SwarmService {
    swarms: Arc<dyn SwarmRepository>,
    agents: Arc<dyn AgentRepository>,
    orchestrator: Arc<Orchestrator>,
    events: EventBus,
}

impl SwarmService {
    pub fn new(
        swarms: Arc<dyn SwarmRepository>,
        agents: Arc<dyn AgentRepository>,
        orchestrator: Arc<Orchestrator>,
        events: EventBus,
    ) -> Self {
        Self {
            swarms,
            agents,
            orchestrator,
            events,
        }
    }

    /// Create a swarm and its queen agent. Invalid input fails before
    /// anything is written.
    #[instrument(skip(self, options), fields(name = %options.name))]
    pub async fn init_swarm(&self, options: InitSwarmOptions) -> HiveResult<(Swarm, Agent)> {
        let swarm = Swarm::new(options.name, options.objective)
            .with_queen_type(options.queen_type)
            .with_config(SwarmConfig {
                max_workers: options.max_workers,
                consensus_algorithm: options.consensus_algorithm,
                auto_scale: options.auto_scale,
                encryption: options.encryption,
            });
        swarm.validate().map_err(HiveError::ValidationFailed)?;

        self.swarms.create(&swarm).await?;
        let queen = Agent::queen(swarm.id, swarm.queen_type);
        self.agents.create(&queen).await?;

        self.events.publish_swarm(SwarmEvent::SwarmCreated {
            swarm_id: swarm.id,
            name: swarm.name.clone(),
        });
        self.events.publish_swarm(SwarmEvent::AgentSpawned {
            swarm_id: swarm.id,
            agent_id: queen.id,
            name: queen.name.clone(),
        });
        info!(swarm_id = %swarm.id, queen = %queen.name, "swarm initialized");
        Ok((swarm, queen))
    }

    /// Spawn one worker of the given type, respecting `max_workers`.
    #[instrument(skip(self))]
    pub async fn spawn_worker(&self, swarm_id: Uuid, worker_type: WorkerType) -> HiveResult<Agent> {
        let swarm = self.get_swarm(swarm_id).await?;
        if swarm.status != SwarmStatus::Active {
            return Err(HiveError::ValidationFailed(format!(
                "swarm {} is {}, not active",
                swarm_id,
                swarm.status.as_str()
            )));
        }

        let existing = self.agents.list_by_swarm(swarm_id, None).await?;
        let workers = existing
            .iter()
            .filter(|a| a.role == crate::domain::models::AgentRole::Worker)
            .count() as u32;
        if workers >= swarm.config.max_workers {
            return Err(HiveError::ValidationFailed(format!(
                "swarm {} already has {} of {} workers",
                swarm_id, workers, swarm.config.max_workers
            )));
        }

        let ordinal = existing
            .iter()
            .filter(|a| a.worker_type == Some(worker_type))
            .count()
            + 1;
        let agent = Agent::worker(swarm_id, worker_type, ordinal);
        self.agents.create(&agent).await?;

        self.events.publish_swarm(SwarmEvent::AgentSpawned {
            swarm_id,
            agent_id: agent.id,
            name: agent.name.clone(),
        });
        Ok(agent)
    }

    /// Pause an active swarm.
    pub async fn pause_swarm(&self, swarm_id: Uuid) -> HiveResult<Swarm> {
        self.transition_swarm(swarm_id, SwarmStatus::Paused).await
    }

    /// Resume a paused swarm.
    pub async fn resume_swarm(&self, swarm_id: Uuid) -> HiveResult<Swarm> {
        self.transition_swarm(swarm_id, SwarmStatus::Active).await
    }

    /// Cancel a swarm: cancel every live task (releasing its resources),
    /// terminate every agent, then mark the swarm cancelled.
    #[instrument(skip(self))]
    pub async fn cancel_swarm(&self, swarm_id: Uuid, reason: &str) -> HiveResult<Swarm> {
        let mut swarm = self.get_swarm(swarm_id).await?;
        if swarm.status.is_terminal() {
            return Ok(swarm);
        }

        self.orchestrator
            .cancel_swarm_tasks(swarm_id, reason)
            .await?;

        for mut agent in self.agents.list_by_swarm(swarm_id, None).await? {
            if agent.status != AgentStatus::Terminated {
                agent
                    .transition(AgentStatus::Terminated)
                    .map_err(HiveError::ValidationFailed)?;
                self.agents.update(&agent).await?;
            }
        }

        swarm
            .transition(SwarmStatus::Cancelled)
            .map_err(HiveError::ValidationFailed)?;
        swarm.updated_at = Utc::now();
        self.swarms.update(&swarm).await?;
        self.events.publish_swarm(SwarmEvent::SwarmStatusChanged {
            swarm_id,
            status: SwarmStatus::Cancelled,
        });
        info!(%swarm_id, reason, "swarm cancelled");
        Ok(swarm)
    }

    pub async fn get_swarm(&self, swarm_id: Uuid) -> HiveResult<Swarm> {
        self.swarms
            .get(swarm_id)
            .await?
            .ok_or_else(|| HiveError::SwarmNotFound(swarm_id.to_string()))
    }

    pub async fn list_swarms(&self, status: Option<SwarmStatus>) -> HiveResult<Vec<Swarm>> {
        self.swarms.list(status).await
    }

    pub async fn list_agents(&self, swarm_id: Uuid) -> HiveResult<Vec<Agent>> {
        self.agents.list_by_swarm(swarm_id, None).await
    }

    async fn transition_swarm(&self, swarm_id: Uuid, status: SwarmStatus) -> HiveResult<Swarm> {
        let mut swarm = self.get_swarm(swarm_id).await?;
        swarm
            .transition(status)
            .map_err(|_| HiveError::InvalidStateTransition {
                from: swarm.status.as_str().to_string(),
                to: status.as_str().to_string(),
            })?;
        self.swarms.update(&swarm).await?;
        self.events
            .publish_swarm(SwarmEvent::SwarmStatusChanged { swarm_id, status });
        Ok(swarm)
    }
}
