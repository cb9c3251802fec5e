//! Agent domain model.
//!
//! Agents are the workers of a swarm. Exactly one queen coordinates each
//! swarm; workers are specialized by a fixed capability set per worker type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Role of an agent within its swarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    /// The single coordinator agent of a swarm.
    Queen,
    /// A specialized worker.
    Worker,
}

impl AgentRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queen => "queen",
            Self::Worker => "worker",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "queen" => Some(Self::Queen),
            "worker" => Some(Self::Worker),
            _ => None,
        }
    }
}

/// Lifecycle status of an agent.
///
/// `idle → active → busy → {idle, failed}`; `terminated` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Idle,
    Active,
    Busy,
    Failed,
    Terminated,
}

impl Default for AgentStatus {
    fn default() -> Self {
        Self::Idle
    }
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Active => "active",
            Self::Busy => "busy",
            Self::Failed => "failed",
            Self::Terminated => "terminated",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "idle" => Some(Self::Idle),
            "active" => Some(Self::Active),
            "busy" => Some(Self::Busy),
            "failed" => Some(Self::Failed),
            "terminated" => Some(Self::Terminated),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminated)
    }

    /// Valid transitions from this status.
    pub fn valid_transitions(&self) -> &'static [AgentStatus] {
        match self {
            Self::Idle => &[Self::Active, Self::Terminated],
            Self::Active => &[Self::Busy, Self::Idle, Self::Failed, Self::Terminated],
            Self::Busy => &[Self::Idle, Self::Failed, Self::Terminated],
            Self::Failed => &[Self::Idle, Self::Terminated],
            Self::Terminated => &[],
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }
}

/// Closed set of worker specializations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerType {
    Researcher,
    Coder,
    Analyst,
    Tester,
    Architect,
    Reviewer,
    Optimizer,
    Documenter,
}

impl WorkerType {
    /// All worker types in selection priority order.
    pub const ALL: [WorkerType; 8] = [
        Self::Researcher,
        Self::Coder,
        Self::Architect,
        Self::Tester,
        Self::Analyst,
        Self::Optimizer,
        Self::Reviewer,
        Self::Documenter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Researcher => "researcher",
            Self::Coder => "coder",
            Self::Analyst => "analyst",
            Self::Tester => "tester",
            Self::Architect => "architect",
            Self::Reviewer => "reviewer",
            Self::Optimizer => "optimizer",
            Self::Documenter => "documenter",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "researcher" => Some(Self::Researcher),
            "coder" => Some(Self::Coder),
            "analyst" => Some(Self::Analyst),
            "tester" => Some(Self::Tester),
            "architect" => Some(Self::Architect),
            "reviewer" => Some(Self::Reviewer),
            "optimizer" => Some(Self::Optimizer),
            "documenter" => Some(Self::Documenter),
            _ => None,
        }
    }

    /// Fixed capability set for this worker type.
    pub fn capabilities(&self) -> &'static [&'static str] {
        match self {
            Self::Researcher => &["web-search", "data-gathering", "analysis", "synthesis"],
            Self::Coder => &[
                "code-generation",
                "implementation",
                "refactoring",
                "debugging",
            ],
            Self::Analyst => &[
                "data-analysis",
                "pattern-recognition",
                "reporting",
                "visualization",
            ],
            Self::Tester => &[
                "test-generation",
                "quality-assurance",
                "bug-detection",
                "validation",
            ],
            Self::Architect => &[
                "system-design",
                "architecture",
                "planning",
                "documentation",
            ],
            Self::Reviewer => &["code-review", "quality-check", "feedback", "improvement"],
            Self::Optimizer => &[
                "performance-tuning",
                "optimization",
                "profiling",
                "enhancement",
            ],
            Self::Documenter => &[
                "documentation",
                "explanation",
                "tutorial-creation",
                "knowledge-base",
            ],
        }
    }
}

impl std::fmt::Display for WorkerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-agent execution accounting.
///
/// `busy_millis` accumulates wall time spent in `busy`; workload is derived
/// as busy time over lifetime so it always stays within [0, 1].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentMetrics {
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    /// Accumulated milliseconds spent in `busy`.
    pub busy_millis: u64,
    /// Moment the agent last entered `busy`, if currently busy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub busy_since: Option<DateTime<Utc>>,
}

impl AgentMetrics {
    /// Record entry into the busy state.
    pub fn mark_busy(&mut self, now: DateTime<Utc>) {
        self.busy_since = Some(now);
    }

    /// Record exit from the busy state, folding elapsed time into the total.
    pub fn mark_not_busy(&mut self, now: DateTime<Utc>) {
        if let Some(since) = self.busy_since.take() {
            let elapsed = (now - since).num_milliseconds().max(0) as u64;
            self.busy_millis += elapsed;
        }
    }

    /// Fraction of lifetime spent busy, in [0, 1].
    pub fn workload(&self, created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
        let lifetime = (now - created_at).num_milliseconds().max(1) as f64;
        let mut busy = self.busy_millis as f64;
        if let Some(since) = self.busy_since {
            busy += (now - since).num_milliseconds().max(0) as f64;
        }
        (busy / lifetime).clamp(0.0, 1.0)
    }
}

/// An agent participating in a swarm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    /// Unique identifier.
    pub id: Uuid,
    /// Owning swarm.
    pub swarm_id: Uuid,
    /// Display name, e.g. `coder-1`.
    pub name: String,
    /// Worker specialization; `None` for the queen.
    pub worker_type: Option<WorkerType>,
    /// Queen or worker.
    pub role: AgentRole,
    /// Lifecycle status.
    pub status: AgentStatus,
    /// Capability tags this agent can serve.
    pub capabilities: BTreeSet<String>,
    /// Ordered set of task ids currently assigned.
    pub current_tasks: Vec<Uuid>,
    /// Busy-time fraction in [0, 1], refreshed from metrics.
    pub workload: f64,
    /// Execution accounting.
    pub metrics: AgentMetrics,
    /// When created.
    pub created_at: DateTime<Utc>,
}

impl Agent {
    /// Create the queen agent for a swarm.
    pub fn queen(swarm_id: Uuid, queen_type: super::swarm::QueenType) -> Self {
        Self {
            id: Uuid::new_v4(),
            swarm_id,
            name: format!("queen-{}", queen_type.as_str()),
            worker_type: None,
            role: AgentRole::Queen,
            status: AgentStatus::Active,
            capabilities: ["coordination", "planning", "delegation"]
                .into_iter()
                .map(String::from)
                .collect(),
            current_tasks: Vec::new(),
            workload: 0.0,
            metrics: AgentMetrics::default(),
            created_at: Utc::now(),
        }
    }

    /// Create a worker agent with the capability set of its type.
    pub fn worker(swarm_id: Uuid, worker_type: WorkerType, ordinal: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            swarm_id,
            name: format!("{}-{}", worker_type.as_str(), ordinal),
            worker_type: Some(worker_type),
            role: AgentRole::Worker,
            status: AgentStatus::Idle,
            capabilities: worker_type
                .capabilities()
                .iter()
                .map(|c| (*c).to_string())
                .collect(),
            current_tasks: Vec::new(),
            workload: 0.0,
            metrics: AgentMetrics::default(),
            created_at: Utc::now(),
        }
    }

    /// Whether this agent's capabilities cover all required tags.
    pub fn covers(&self, required: &[String]) -> bool {
        required.iter().all(|tag| self.capabilities.contains(tag))
    }

    /// Transition to a new status, enforcing the lifecycle.
    pub fn transition(&mut self, new_status: AgentStatus) -> Result<(), String> {
        if !self.status.can_transition_to(new_status) {
            return Err(format!(
                "invalid agent transition {} -> {}",
                self.status.as_str(),
                new_status.as_str()
            ));
        }
        let now = Utc::now();
        match (self.status, new_status) {
            (_, AgentStatus::Busy) => self.metrics.mark_busy(now),
            (AgentStatus::Busy, _) => self.metrics.mark_not_busy(now),
            _ => {}
        }
        self.status = new_status;
        self.workload = self.metrics.workload(self.created_at, now);
        Ok(())
    }
}
