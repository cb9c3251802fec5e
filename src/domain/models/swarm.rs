//! Swarm domain model.
//!
//! A swarm is a named collection of agents working on one objective,
//! coordinated by a single queen agent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Coordination style of the swarm's queen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueenType {
    /// Long-horizon planning, high consensus bar.
    Strategic,
    /// Short-horizon execution focus.
    Tactical,
    /// Switches between strategic and tactical per workload.
    Adaptive,
}

impl Default for QueenType {
    fn default() -> Self {
        Self::Strategic
    }
}

impl QueenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strategic => "strategic",
            Self::Tactical => "tactical",
            Self::Adaptive => "adaptive",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "strategic" => Some(Self::Strategic),
            "tactical" => Some(Self::Tactical),
            "adaptive" => Some(Self::Adaptive),
            _ => None,
        }
    }
}

/// Lifecycle status of a swarm.
///
/// Transitions are monotonic except `Active` ↔ `Paused`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwarmStatus {
    Active,
    Paused,
    Completed,
    Cancelled,
}

impl Default for SwarmStatus {
    fn default() -> Self {
        Self::Active
    }
}

impl SwarmStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "active" => Some(Self::Active),
            "paused" => Some(Self::Paused),
            "completed" => Some(Self::Completed),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Valid transitions from this status.
    pub fn valid_transitions(&self) -> &'static [SwarmStatus] {
        match self {
            Self::Active => &[Self::Paused, Self::Completed, Self::Cancelled],
            Self::Paused => &[Self::Active, Self::Completed, Self::Cancelled],
            Self::Completed | Self::Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }
}

/// Feature toggles and limits recorded with the swarm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmConfig {
    /// Maximum number of worker agents (1..=100).
    pub max_workers: u32,
    /// Default consensus algorithm for decisions in this swarm.
    pub consensus_algorithm: crate::domain::models::consensus::ConsensusAlgorithm,
    /// Whether the orchestrator may scale workers up and down.
    pub auto_scale: bool,
    /// Encryption-at-rest toggle, recorded but not enforced here.
    pub encryption: bool,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            max_workers: 8,
            consensus_algorithm: crate::domain::models::consensus::ConsensusAlgorithm::Majority,
            auto_scale: false,
            encryption: false,
        }
    }
}

/// A swarm of agents working on one objective.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Swarm {
    /// Unique identifier.
    pub id: Uuid,
    /// Human-readable name.
    pub name: String,
    /// The user-supplied objective this swarm pursues.
    pub objective: String,
    /// Coordination style of the queen.
    pub queen_type: QueenType,
    /// Lifecycle status.
    pub status: SwarmStatus,
    /// Limits and toggles.
    pub config: SwarmConfig,
    /// When created.
    pub created_at: DateTime<Utc>,
    /// When last updated.
    pub updated_at: DateTime<Utc>,
}

impl Swarm {
    /// Create a new active swarm.
    pub fn new(name: impl Into<String>, objective: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            objective: objective.into(),
            queen_type: QueenType::default(),
            status: SwarmStatus::Active,
            config: SwarmConfig::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the queen type.
    pub fn with_queen_type(mut self, queen_type: QueenType) -> Self {
        self.queen_type = queen_type;
        self
    }

    /// Set the swarm config.
    pub fn with_config(mut self, config: SwarmConfig) -> Self {
        self.config = config;
        self
    }

    /// Validate the swarm fields.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Swarm name cannot be empty".to_string());
        }
        if self.objective.trim().is_empty() {
            return Err("Swarm objective cannot be empty".to_string());
        }
        if !(1..=100).contains(&self.config.max_workers) {
            return Err(format!(
                "maxWorkers must be in [1, 100], got {}",
                self.config.max_workers
            ));
        }
        Ok(())
    }

    /// Transition to a new status, enforcing the monotonic lifecycle.
    pub fn transition(&mut self, new_status: SwarmStatus) -> Result<(), String> {
        if !self.status.can_transition_to(new_status) {
            return Err(format!(
                "invalid swarm transition {} -> {}",
                self.status.as_str(),
                new_status.as_str()
            ));
        }
        self.status = new_status;
        self.updated_at = Utc::now();
        Ok(())
    }
}
