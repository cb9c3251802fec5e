//! Task orchestrator: lifecycle, resources, and dispatch.
//!
//! Tasks move `queued → running → {completed, failed, cancelled}`.
//! Dispatch hands ready tasks to idle agents whose capabilities cover the
//! task's tags, lowest workload first. Resource claims are taken when a
//! task starts and returned when it leaves `running`, including on
//! cancellation rollback.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{HiveError, HiveResult};
use crate::domain::models::{
    Agent, AgentStatus, DependencyKind, ResourceRequirement, Task, TaskDependency, TaskSchedule,
    TaskStatus,
};
use crate::domain::ports::{AgentRepository, TaskFilter, TaskRepository};
use crate::services::event_bus::{EventBus, SwarmEvent};

pub const DEFAULT_MAX_CONCURRENT_TASKS: usize = 10;

/// A named resource with bounded capacity.
#[derive(Debug, Clone)]
pub struct Resource {
    pub capacity: u64,
    pub available: u64,
}

/// In-memory registry of resources and per-task claims.
#[derive(Debug, Default)]
struct ResourceRegistry {
    resources: HashMap<String, Resource>,
    claims: HashMap<Uuid, Vec<ResourceRequirement>>,
}

impl ResourceRegistry {
    fn register(&mut self, name: &str, capacity: u64) {
        self.resources.insert(
            name.to_string(),
            Resource {
                capacity,
                available: capacity,
            },
        );
    }

    /// Validate that every requirement names a known resource and fits its
    /// total capacity.
    fn validate(&self, requirements: &[ResourceRequirement]) -> HiveResult<()> {
        for req in requirements {
            let resource = self
                .resources
                .get(&req.resource)
                .ok_or_else(|| HiveError::UnknownResource(req.resource.clone()))?;
            if req.amount > resource.capacity {
                return Err(HiveError::ResourceUnavailable {
                    resource: req.resource.clone(),
                    requested: req.amount,
                    available: resource.capacity,
                });
            }
        }
        Ok(())
    }

    /// Claim every requirement atomically; nothing is taken on failure.
    fn claim(&mut self, task_id: Uuid, requirements: &[ResourceRequirement]) -> HiveResult<()> {
        for req in requirements {
            let resource = self
                .resources
                .get(&req.resource)
                .ok_or_else(|| HiveError::UnknownResource(req.resource.clone()))?;
            if req.amount > resource.available {
                return Err(HiveError::ResourceUnavailable {
                    resource: req.resource.clone(),
                    requested: req.amount,
                    available: resource.available,
                });
            }
        }
        for req in requirements {
            if let Some(resource) = self.resources.get_mut(&req.resource) {
                resource.available -= req.amount;
            }
        }
        if !requirements.is_empty() {
            self.claims.insert(task_id, requirements.to_vec());
        }
        Ok(())
    }

    /// Return everything the task holds.
    fn release(&mut self, task_id: Uuid) {
        if let Some(claims) = self.claims.remove(&task_id) {
            for req in claims {
                if let Some(resource) = self.resources.get_mut(&req.resource) {
                    resource.available =
                        (resource.available + req.amount).min(resource.capacity);
                }
            }
        }
    }
}

/// Parameters for `create_task`.
#[derive(Debug, Clone)]
pub struct CreateTaskOptions {
    pub swarm_id: Uuid,
    pub description: String,
    pub task_type: String,
    pub priority: u8,
    pub parent_task_id: Option<Uuid>,
    pub dependencies: Vec<TaskDependency>,
    pub resource_requirements: Vec<ResourceRequirement>,
    pub required_capabilities: Vec<String>,
    pub tags: Vec<String>,
    pub schedule: Option<TaskSchedule>,
}

impl CreateTaskOptions {
    pub fn new(swarm_id: Uuid, description: impl Into<String>) -> Self {
        Self {
            swarm_id,
            description: description.into(),
            task_type: "standard".to_string(),
            priority: 5,
            parent_task_id: None,
            dependencies: Vec::new(),
            resource_requirements: Vec::new(),
            required_capabilities: Vec::new(),
            tags: Vec::new(),
            schedule: None,
        }
    }

    pub fn priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn parent(mut self, parent_task_id: Uuid) -> Self {
        self.parent_task_id = Some(parent_task_id);
        self
    }

    pub fn dependency(mut self, dep: TaskDependency) -> Self {
        self.dependencies.push(dep);
        self
    }

    pub fn resource(mut self, resource: impl Into<String>, amount: u64) -> Self {
        self.resource_requirements.push(ResourceRequirement {
            resource: resource.into(),
            amount,
        });
        self
    }

    pub fn required_capabilities(mut self, tags: &[&str]) -> Self {
        self.required_capabilities = tags.iter().map(|t| (*t).to_string()).collect();
        self
    }
}

/// Field updates for `update_task`; unset fields stay untouched.
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub status: Option<TaskStatus>,
    pub progress: Option<i64>,
    pub results: Option<serde_json::Value>,
    pub assigned_agent: Option<Uuid>,
    pub metadata_payload: Option<serde_json::Value>,
}

pub struct Orchestrator {
    tasks: Arc<dyn TaskRepository>,
    agents: Arc<dyn AgentRepository>,
    resources: Mutex<ResourceRegistry>,
    events: EventBus,
    max_concurrent_tasks: usize,
}

impl Orchestrator {
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        agents: Arc<dyn AgentRepository>,
        events: EventBus,
    ) -> Self {
        Self {
            tasks,
            agents,
            resources: Mutex::new(ResourceRegistry::default()),
            events,
            max_concurrent_tasks: DEFAULT_MAX_CONCURRENT_TASKS,
        }
    }

    pub fn with_max_concurrent_tasks(mut self, max: usize) -> Self {
        self.max_concurrent_tasks = max.max(1);
        self
    }

    /// Register a named resource with its capacity.
    pub fn register_resource(&self, name: &str, capacity: u64) {
        self.resources
            .lock()
            .expect("resource registry poisoned")
            .register(name, capacity);
    }

    /// Current availability of a resource.
    pub fn resource_available(&self, name: &str) -> Option<u64> {
        self.resources
            .lock()
            .expect("resource registry poisoned")
            .resources
            .get(name)
            .map(|r| r.available)
    }

    /// Create a queued task after validating its dependencies and resources.
    #[instrument(skip(self, options), fields(swarm_id = %options.swarm_id))]
    pub async fn create_task(&self, options: CreateTaskOptions) -> HiveResult<Task> {
        let mut task = Task::new(options.swarm_id, options.description)
            .with_priority(options.priority)
            .with_capabilities(options.required_capabilities);
        task.task_type = options.task_type;
        task.dependencies = options.dependencies;
        task.resource_requirements = options.resource_requirements;
        task.tags = options.tags;
        task.schedule = options.schedule;
        task.parent_task_id = options.parent_task_id;
        task.validate().map_err(HiveError::ValidationFailed)?;

        // Every declared dependency must be an existing task of this swarm.
        for dep in &task.dependencies {
            let existing = self
                .tasks
                .get(dep.task_id)
                .await?
                .ok_or_else(|| HiveError::UnknownDependency {
                    task_id: task.id.to_string(),
                    dependency_id: dep.task_id.to_string(),
                })?;
            if existing.swarm_id != task.swarm_id {
                return Err(HiveError::UnknownDependency {
                    task_id: task.id.to_string(),
                    dependency_id: dep.task_id.to_string(),
                });
            }
        }

        self.resources
            .lock()
            .expect("resource registry poisoned")
            .validate(&task.resource_requirements)?;

        self.tasks.create(&task).await?;

        if let Some(parent_id) = task.parent_task_id {
            let mut parent = self
                .tasks
                .get(parent_id)
                .await?
                .ok_or_else(|| HiveError::TaskNotFound(parent_id.to_string()))?;
            parent.subtask_ids.push(task.id);
            self.tasks.update(&parent).await?;
        }

        self.events.publish_swarm(SwarmEvent::TaskCreated {
            swarm_id: task.swarm_id,
            task_id: task.id,
        });
        Ok(task)
    }

    /// Apply a partial update; progress clamps to [0, 100] and the
    /// completion invariants are kept by the status transition.
    #[instrument(skip(self, update))]
    pub async fn update_task(&self, task_id: Uuid, update: TaskUpdate) -> HiveResult<Task> {
        let mut task = self
            .tasks
            .get(task_id)
            .await?
            .ok_or_else(|| HiveError::TaskNotFound(task_id.to_string()))?;

        if let Some(progress) = update.progress {
            task.progress = progress.clamp(0, 100) as u8;
        }
        if let Some(agent_id) = update.assigned_agent {
            task.assigned_agent_id = Some(agent_id);
        }
        if let Some(results) = update.results {
            task.metadata.results = Some(results);
        }
        if let Some(payload) = update.metadata_payload {
            task.metadata.payload = Some(payload);
        }

        if let Some(status) = update.status {
            if status == TaskStatus::Completed {
                self.check_finish_gates(&task).await?;
            }
            task.transition(status)
                .map_err(|_| HiveError::InvalidStateTransition {
                    from: task.status.as_str().to_string(),
                    to: status.as_str().to_string(),
                })?;
            if status.is_terminal() {
                self.resources
                    .lock()
                    .expect("resource registry poisoned")
                    .release(task.id);
                self.detach_agent(&task, status).await?;
            }
        }

        self.tasks.update(&task).await?;
        self.events.publish_swarm(SwarmEvent::TaskStatusChanged {
            task_id: task.id,
            status: task.status,
            progress: task.progress,
        });

        // A finished task may unblock dependents.
        if task.status.is_terminal() {
            self.dispatch_ready(task.swarm_id).await?;
        }
        Ok(task)
    }

    /// Cancel a task and (with rollback) its whole subtask tree, releasing
    /// every claimed resource. A terminal task is left untouched.
    #[instrument(skip(self))]
    pub async fn cancel_task(
        &self,
        task_id: Uuid,
        reason: &str,
        rollback: bool,
    ) -> HiveResult<()> {
        let Some(mut task) = self.tasks.get(task_id).await? else {
            return Err(HiveError::TaskNotFound(task_id.to_string()));
        };
        if task.status.is_terminal() {
            return Ok(());
        }

        if rollback {
            for subtask_id in task.subtask_ids.clone() {
                Box::pin(self.cancel_task(subtask_id, reason, rollback)).await?;
            }
        }

        self.resources
            .lock()
            .expect("resource registry poisoned")
            .release(task.id);

        task.metadata.reason = Some(reason.to_string());
        task.transition(TaskStatus::Cancelled)
            .map_err(HiveError::ValidationFailed)?;
        self.detach_agent(&task, TaskStatus::Cancelled).await?;
        self.tasks.update(&task).await?;

        self.events.publish_swarm(SwarmEvent::TaskStatusChanged {
            task_id: task.id,
            status: TaskStatus::Cancelled,
            progress: task.progress,
        });
        info!(%task_id, reason, "task cancelled");
        Ok(())
    }

    /// Cancel every live task of a swarm.
    pub async fn cancel_swarm_tasks(&self, swarm_id: Uuid, reason: &str) -> HiveResult<()> {
        let filter = TaskFilter {
            swarm_id: Some(swarm_id),
            ..TaskFilter::default()
        };
        for task in self.tasks.list(&filter).await? {
            if !task.status.is_terminal() {
                self.cancel_task(task.id, reason, true).await?;
            }
        }
        Ok(())
    }

    /// Start every task whose dependencies are satisfied, bounded by the
    /// running-task cap. Returns `(task, agent)` pairs that started.
    #[instrument(skip(self))]
    pub async fn dispatch_ready(&self, swarm_id: Uuid) -> HiveResult<Vec<(Uuid, Uuid)>> {
        let all_tasks = self
            .tasks
            .list(&TaskFilter {
                swarm_id: Some(swarm_id),
                ..TaskFilter::default()
            })
            .await?;

        let mut running = all_tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Running)
            .count();

        let by_id: HashMap<Uuid, &Task> = all_tasks.iter().map(|t| (t.id, t)).collect();
        let mut queued: Vec<&Task> = all_tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Queued)
            .collect();
        // Highest priority first, then oldest.
        queued.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.created_at.cmp(&b.created_at)));

        let mut agents = self.idle_agents(swarm_id).await?;
        let mut started = Vec::new();
        let now = Utc::now();

        for task in queued {
            if running >= self.max_concurrent_tasks {
                debug!(swarm_id = %swarm_id, "running-task cap reached, leaving rest queued");
                break;
            }
            if !self.start_gates_open(task, &by_id, now) {
                continue;
            }
            if let Some(schedule) = &task.schedule {
                if matches!(schedule.not_before, Some(t) if t > now) {
                    continue;
                }
            }

            let Some(agent_idx) = pick_agent(&agents, &task.metadata.required_capabilities)
            else {
                continue;
            };

            // Claim resources before the status flips; skip (leave queued)
            // when contended.
            let claimed = self
                .resources
                .lock()
                .expect("resource registry poisoned")
                .claim(task.id, &task.resource_requirements);
            if let Err(err) = claimed {
                debug!(task_id = %task.id, error = %err, "resources contended, task stays queued");
                continue;
            }

            let mut agent = agents.remove(agent_idx);
            let mut task = task.clone();
            task.assigned_agent_id = Some(agent.id);
            if let Err(e) = task.transition(TaskStatus::Running) {
                warn!(task_id = %task.id, error = %e, "start transition refused");
                self.resources
                    .lock()
                    .expect("resource registry poisoned")
                    .release(task.id);
                continue;
            }

            agent
                .transition(AgentStatus::Active)
                .map_err(HiveError::ValidationFailed)?;
            agent
                .transition(AgentStatus::Busy)
                .map_err(HiveError::ValidationFailed)?;
            agent.current_tasks.push(task.id);

            self.tasks.update(&task).await?;
            self.agents.update(&agent).await?;
            self.events.publish_swarm(SwarmEvent::TaskAssigned {
                task_id: task.id,
                agent_id: agent.id,
            });
            self.events.publish_swarm(SwarmEvent::TaskStatusChanged {
                task_id: task.id,
                status: TaskStatus::Running,
                progress: task.progress,
            });
            started.push((task.id, agent.id));
            running += 1;
        }

        Ok(started)
    }

    /// Start a workflow: dispatch everything currently unblocked.
    pub async fn run_workflow(&self, swarm_id: Uuid) -> HiveResult<Vec<(Uuid, Uuid)>> {
        self.dispatch_ready(swarm_id).await
    }

    pub async fn get_task(&self, task_id: Uuid) -> HiveResult<Task> {
        self.tasks
            .get(task_id)
            .await?
            .ok_or_else(|| HiveError::TaskNotFound(task_id.to_string()))
    }

    pub async fn list_tasks(&self, filter: &TaskFilter) -> HiveResult<Vec<Task>> {
        self.tasks.list(filter).await
    }

    pub async fn status_counts(
        &self,
        swarm_id: Option<Uuid>,
    ) -> HiveResult<HashMap<TaskStatus, u64>> {
        self.tasks.status_counts(swarm_id).await
    }

    /// Whether every start-gating dependency (finish-to-start,
    /// start-to-start) is satisfied, lag included.
    fn start_gates_open(
        &self,
        task: &Task,
        by_id: &HashMap<Uuid, &Task>,
        now: chrono::DateTime<Utc>,
    ) -> bool {
        task.dependencies.iter().all(|dep| {
            let Some(dep_task) = by_id.get(&dep.task_id) else {
                return false;
            };
            let lag = Duration::milliseconds(dep.lag_ms as i64);
            match dep.kind {
                DependencyKind::FinishToStart => match dep_task.completed_at {
                    Some(completed) => {
                        dep_task.status == TaskStatus::Completed && completed + lag <= now
                    }
                    None => false,
                },
                DependencyKind::StartToStart => match dep_task.started_at {
                    Some(started) => started + lag <= now,
                    None => false,
                },
                // Finish gates don't block starting.
                DependencyKind::FinishToFinish | DependencyKind::StartToFinish => true,
            }
        })
    }

    /// Finish gates: a task may only complete once its finish-to-finish
    /// dependencies completed and start-to-finish dependencies started.
    async fn check_finish_gates(&self, task: &Task) -> HiveResult<()> {
        for dep in &task.dependencies {
            let dep_task = self
                .tasks
                .get(dep.task_id)
                .await?
                .ok_or_else(|| HiveError::TaskNotFound(dep.task_id.to_string()))?;
            let satisfied = match dep.kind {
                DependencyKind::FinishToFinish => dep_task.status == TaskStatus::Completed,
                DependencyKind::StartToFinish => dep_task.started_at.is_some(),
                DependencyKind::FinishToStart | DependencyKind::StartToStart => true,
            };
            if !satisfied {
                return Err(HiveError::ValidationFailed(format!(
                    "task {} cannot finish: {} dependency {} unsatisfied",
                    task.id,
                    dep.kind.as_str(),
                    dep.task_id
                )));
            }
        }
        Ok(())
    }

    async fn idle_agents(&self, swarm_id: Uuid) -> HiveResult<Vec<Agent>> {
        self.agents
            .list_by_swarm(swarm_id, Some(AgentStatus::Idle))
            .await
    }

    /// Free the agent a finished task was assigned to and fold the outcome
    /// into its metrics.
    async fn detach_agent(&self, task: &Task, outcome: TaskStatus) -> HiveResult<()> {
        let Some(agent_id) = task.assigned_agent_id else {
            return Ok(());
        };
        let Some(mut agent) = self.agents.get(agent_id).await? else {
            return Ok(());
        };

        agent.current_tasks.retain(|id| *id != task.id);
        match outcome {
            TaskStatus::Completed => agent.metrics.tasks_completed += 1,
            TaskStatus::Failed => agent.metrics.tasks_failed += 1,
            _ => {}
        }
        if agent.status == AgentStatus::Busy && agent.current_tasks.is_empty() {
            agent
                .transition(AgentStatus::Idle)
                .map_err(HiveError::ValidationFailed)?;
        }
        self.agents.update(&agent).await
    }
}

/// The idle agent covering all required tags with the lowest workload;
/// ties break lexicographically by agent id.
fn pick_agent(agents: &[Agent], required: &[String]) -> Option<usize> {
    agents
        .iter()
        .enumerate()
        .filter(|(_, a)| a.covers(required))
        .min_by(|(_, a), (_, b)| {
            a.workload
                .partial_cmp(&b.workload)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.to_string().cmp(&b.id.to_string()))
        })
        .map(|(idx, _)| idx)
}
