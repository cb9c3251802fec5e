mod common;

use std::sync::Arc;

use common::setup_hive_store;
use hivemind::adapters::sqlite::{
    SqliteAgentRepository, SqliteSwarmRepository, SqliteTaskRepository,
};
use hivemind::domain::errors::HiveError;
use hivemind::domain::models::{Agent, AgentStatus, Swarm, TaskDependency, TaskStatus, WorkerType};
use hivemind::domain::ports::{AgentRepository, SwarmRepository, TaskFilter};
use hivemind::services::{CreateTaskOptions, EventBus, Orchestrator, TaskUpdate};

struct Fixture {
    orchestrator: Orchestrator,
    agents: Arc<SqliteAgentRepository>,
    swarm_id: uuid::Uuid,
}

async fn setup() -> Fixture {
    let store = setup_hive_store().await;
    let swarms = SqliteSwarmRepository::new(store.pool().clone());
    let swarm = Swarm::new("orchestrator-test", "run tasks");
    swarms.create(&swarm).await.expect("swarm insert failed");

    let tasks = Arc::new(SqliteTaskRepository::new(store.pool().clone()));
    let agents = Arc::new(SqliteAgentRepository::new(store.pool().clone()));
    let orchestrator = Orchestrator::new(tasks, agents.clone(), EventBus::new());
    Fixture {
        orchestrator,
        agents,
        swarm_id: swarm.id,
    }
}

async fn spawn_worker(fixture: &Fixture, worker_type: WorkerType, ordinal: usize) -> Agent {
    let agent = Agent::worker(fixture.swarm_id, worker_type, ordinal);
    fixture.agents.create(&agent).await.expect("agent insert failed");
    agent
}

#[tokio::test]
async fn test_create_task_validates_dependencies() {
    let fixture = setup().await;
    let missing = uuid::Uuid::new_v4();
    let err = fixture
        .orchestrator
        .create_task(
            CreateTaskOptions::new(fixture.swarm_id, "depends on nothing real")
                .dependency(TaskDependency::new(missing)),
        )
        .await
        .expect_err("unknown dependency must fail");
    assert!(matches!(err, HiveError::UnknownDependency { .. }));
}

#[tokio::test]
async fn test_dependency_must_live_in_same_swarm() {
    let store = setup_hive_store().await;
    let swarms = SqliteSwarmRepository::new(store.pool().clone());
    let ours = Swarm::new("ours", "objective");
    let theirs = Swarm::new("theirs", "other objective");
    swarms.create(&ours).await.unwrap();
    swarms.create(&theirs).await.unwrap();

    let tasks = Arc::new(SqliteTaskRepository::new(store.pool().clone()));
    let agents = Arc::new(SqliteAgentRepository::new(store.pool().clone()));
    let orchestrator = Orchestrator::new(tasks, agents, EventBus::new());

    let foreign = orchestrator
        .create_task(CreateTaskOptions::new(theirs.id, "foreign task"))
        .await
        .unwrap();

    let err = orchestrator
        .create_task(
            CreateTaskOptions::new(ours.id, "cross-swarm dep")
                .dependency(TaskDependency::new(foreign.id)),
        )
        .await
        .expect_err("dependency outside the swarm must fail");
    assert!(matches!(err, HiveError::UnknownDependency { .. }));
}

#[tokio::test]
async fn test_create_task_validates_resources() {
    let fixture = setup().await;
    fixture.orchestrator.register_resource("cpu", 8);

    let err = fixture
        .orchestrator
        .create_task(
            CreateTaskOptions::new(fixture.swarm_id, "too hungry").resource("cpu", 9),
        )
        .await
        .expect_err("over-capacity requirement must fail");
    assert!(matches!(err, HiveError::ResourceUnavailable { .. }));

    let err = fixture
        .orchestrator
        .create_task(
            CreateTaskOptions::new(fixture.swarm_id, "unknown resource").resource("gpu", 1),
        )
        .await
        .expect_err("unknown resource must fail");
    assert!(matches!(err, HiveError::UnknownResource(_)));
}

#[tokio::test]
async fn test_completed_task_has_progress_100_and_timestamp() {
    let fixture = setup().await;
    spawn_worker(&fixture, WorkerType::Coder, 1).await;

    let task = fixture
        .orchestrator
        .create_task(CreateTaskOptions::new(fixture.swarm_id, "implement feature"))
        .await
        .unwrap();
    fixture.orchestrator.run_workflow(fixture.swarm_id).await.unwrap();

    let done = fixture
        .orchestrator
        .update_task(
            task.id,
            TaskUpdate {
                status: Some(TaskStatus::Completed),
                progress: Some(40), // overridden by the completion invariant
                ..TaskUpdate::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(done.status, TaskStatus::Completed);
    assert_eq!(done.progress, 100);
    assert!(done.completed_at.is_some());
}

#[tokio::test]
async fn test_progress_clamps_to_range() {
    let fixture = setup().await;
    let task = fixture
        .orchestrator
        .create_task(CreateTaskOptions::new(fixture.swarm_id, "slow task"))
        .await
        .unwrap();

    let updated = fixture
        .orchestrator
        .update_task(
            task.id,
            TaskUpdate {
                progress: Some(250),
                ..TaskUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.progress, 100);

    let updated = fixture
        .orchestrator
        .update_task(
            task.id,
            TaskUpdate {
                progress: Some(-5),
                ..TaskUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.progress, 0);
}

#[tokio::test]
async fn test_dispatch_prefers_lowest_workload() {
    let fixture = setup().await;
    let mut loaded = Agent::worker(fixture.swarm_id, WorkerType::Coder, 1);
    loaded.workload = 0.8;
    fixture.agents.create(&loaded).await.unwrap();
    let mut free = Agent::worker(fixture.swarm_id, WorkerType::Coder, 2);
    free.workload = 0.1;
    fixture.agents.create(&free).await.unwrap();

    let task = fixture
        .orchestrator
        .create_task(
            CreateTaskOptions::new(fixture.swarm_id, "implement")
                .required_capabilities(&["implementation"]),
        )
        .await
        .unwrap();

    let started = fixture.orchestrator.run_workflow(fixture.swarm_id).await.unwrap();
    assert_eq!(started, vec![(task.id, free.id)]);
}

#[tokio::test]
async fn test_dispatch_skips_uncovered_tasks() {
    let fixture = setup().await;
    spawn_worker(&fixture, WorkerType::Coder, 1).await;

    fixture
        .orchestrator
        .create_task(
            CreateTaskOptions::new(fixture.swarm_id, "needs research")
                .required_capabilities(&["web-search"]),
        )
        .await
        .unwrap();

    let started = fixture.orchestrator.run_workflow(fixture.swarm_id).await.unwrap();
    assert!(started.is_empty(), "coder cannot cover web-search");
}

#[tokio::test]
async fn test_backpressure_caps_running_tasks() {
    let store = setup_hive_store().await;
    let swarms = SqliteSwarmRepository::new(store.pool().clone());
    let swarm = Swarm::new("backpressure", "cap me");
    swarms.create(&swarm).await.unwrap();
    let tasks = Arc::new(SqliteTaskRepository::new(store.pool().clone()));
    let agents = Arc::new(SqliteAgentRepository::new(store.pool().clone()));
    let orchestrator = Orchestrator::new(tasks, agents.clone(), EventBus::new())
        .with_max_concurrent_tasks(2);

    for i in 0..4 {
        let agent = Agent::worker(swarm.id, WorkerType::Coder, i + 1);
        agents.create(&agent).await.unwrap();
    }
    for i in 0..4 {
        orchestrator
            .create_task(CreateTaskOptions::new(swarm.id, format!("task {i}")))
            .await
            .unwrap();
    }

    let started = orchestrator.run_workflow(swarm.id).await.unwrap();
    assert_eq!(started.len(), 2, "only the cap may run");

    let counts = orchestrator.status_counts(Some(swarm.id)).await.unwrap();
    assert_eq!(counts.get(&TaskStatus::Running).copied().unwrap_or(0), 2);
    assert_eq!(counts.get(&TaskStatus::Queued).copied().unwrap_or(0), 2);
}

#[tokio::test]
async fn test_finish_to_start_dependency_gates_dispatch() {
    let fixture = setup().await;
    spawn_worker(&fixture, WorkerType::Coder, 1).await;
    spawn_worker(&fixture, WorkerType::Tester, 1).await;

    let build = fixture
        .orchestrator
        .create_task(CreateTaskOptions::new(fixture.swarm_id, "build"))
        .await
        .unwrap();
    let test = fixture
        .orchestrator
        .create_task(
            CreateTaskOptions::new(fixture.swarm_id, "test")
                .dependency(TaskDependency::new(build.id)),
        )
        .await
        .unwrap();

    let started = fixture.orchestrator.run_workflow(fixture.swarm_id).await.unwrap();
    assert_eq!(started.len(), 1, "only the independent task starts");
    assert_eq!(started[0].0, build.id);

    // Completing the dependency wakes the dependent.
    fixture
        .orchestrator
        .update_task(
            build.id,
            TaskUpdate {
                status: Some(TaskStatus::Completed),
                ..TaskUpdate::default()
            },
        )
        .await
        .unwrap();

    let test_task = fixture.orchestrator.get_task(test.id).await.unwrap();
    assert_eq!(test_task.status, TaskStatus::Running, "dependent woke up");
}

#[tokio::test]
async fn test_cancel_with_rollback_releases_resources() {
    let fixture = setup().await;
    fixture.orchestrator.register_resource("cpu", 8);
    spawn_worker(&fixture, WorkerType::Coder, 1).await;
    spawn_worker(&fixture, WorkerType::Tester, 1).await;

    // The parent requires a capability no spawned worker has, so only the
    // subtasks start.
    let parent = fixture
        .orchestrator
        .create_task(
            CreateTaskOptions::new(fixture.swarm_id, "parent")
                .required_capabilities(&["planning"]),
        )
        .await
        .unwrap();
    let s1 = fixture
        .orchestrator
        .create_task(
            CreateTaskOptions::new(fixture.swarm_id, "subtask one")
                .parent(parent.id)
                .resource("cpu", 1),
        )
        .await
        .unwrap();
    let s2 = fixture
        .orchestrator
        .create_task(
            CreateTaskOptions::new(fixture.swarm_id, "subtask two")
                .parent(parent.id)
                .resource("cpu", 1),
        )
        .await
        .unwrap();

    // Start the subtasks; 2 of 8 CPU units are claimed.
    fixture.orchestrator.run_workflow(fixture.swarm_id).await.unwrap();
    assert_eq!(fixture.orchestrator.resource_available("cpu"), Some(6));

    fixture
        .orchestrator
        .cancel_task(parent.id, "operator abort", true)
        .await
        .unwrap();

    for id in [parent.id, s1.id, s2.id] {
        let task = fixture.orchestrator.get_task(id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Cancelled, "task {id} cancelled");
    }
    // Rollback returned every claimed unit.
    assert_eq!(fixture.orchestrator.resource_available("cpu"), Some(8));

    // The agents are free again.
    for agent in fixture
        .agents
        .list_by_swarm(fixture.swarm_id, None)
        .await
        .unwrap()
    {
        assert_eq!(agent.status, AgentStatus::Idle);
        assert!(agent.current_tasks.is_empty());
    }
}

#[tokio::test]
async fn test_cancel_terminal_task_is_noop() {
    let fixture = setup().await;
    spawn_worker(&fixture, WorkerType::Coder, 1).await;
    let task = fixture
        .orchestrator
        .create_task(CreateTaskOptions::new(fixture.swarm_id, "finish me"))
        .await
        .unwrap();
    fixture.orchestrator.run_workflow(fixture.swarm_id).await.unwrap();
    fixture
        .orchestrator
        .update_task(
            task.id,
            TaskUpdate {
                status: Some(TaskStatus::Completed),
                ..TaskUpdate::default()
            },
        )
        .await
        .unwrap();

    fixture
        .orchestrator
        .cancel_task(task.id, "too late", true)
        .await
        .expect("cancelling a terminal task is a no-op");
    let after = fixture.orchestrator.get_task(task.id).await.unwrap();
    assert_eq!(after.status, TaskStatus::Completed);
}

#[tokio::test]
async fn test_parent_records_subtasks() {
    let fixture = setup().await;
    let parent = fixture
        .orchestrator
        .create_task(CreateTaskOptions::new(fixture.swarm_id, "parent"))
        .await
        .unwrap();
    let child = fixture
        .orchestrator
        .create_task(
            CreateTaskOptions::new(fixture.swarm_id, "child").parent(parent.id),
        )
        .await
        .unwrap();

    let parent = fixture.orchestrator.get_task(parent.id).await.unwrap();
    assert_eq!(parent.subtask_ids, vec![child.id]);
    assert_eq!(child.parent_task_id, Some(parent.id));
}

#[tokio::test]
async fn test_agent_metrics_follow_outcomes() {
    let fixture = setup().await;
    let worker = spawn_worker(&fixture, WorkerType::Coder, 1).await;

    let task = fixture
        .orchestrator
        .create_task(CreateTaskOptions::new(fixture.swarm_id, "count me"))
        .await
        .unwrap();
    fixture.orchestrator.run_workflow(fixture.swarm_id).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    fixture
        .orchestrator
        .update_task(
            task.id,
            TaskUpdate {
                status: Some(TaskStatus::Completed),
                ..TaskUpdate::default()
            },
        )
        .await
        .unwrap();

    let agent = fixture.agents.get(worker.id).await.unwrap().unwrap();
    assert_eq!(agent.metrics.tasks_completed, 1);
    assert!(agent.metrics.busy_millis > 0, "busy time was accounted");
    assert!((0.0..=1.0).contains(&agent.workload));

    let filter = TaskFilter {
        swarm_id: Some(fixture.swarm_id),
        ..TaskFilter::default()
    };
    assert_eq!(fixture.orchestrator.list_tasks(&filter).await.unwrap().len(), 1);
}
