mod common;

use std::sync::Arc;

use common::setup_hive_store;
use hivemind::adapters::sqlite::{
    SqliteAgentRepository, SqliteSwarmRepository, SqliteTaskRepository,
};
use hivemind::domain::errors::HiveError;
use hivemind::domain::models::{
    AgentRole, AgentStatus, ConsensusAlgorithm, QueenType, SwarmStatus, TaskStatus, WorkerType,
};
use hivemind::services::queen::{analyze_objective, fill_worker_roster, select_worker_types};
use hivemind::services::{
    CreateTaskOptions, EventBus, InitSwarmOptions, Orchestrator, SwarmService,
};

fn init_options() -> InitSwarmOptions {
    InitSwarmOptions {
        name: "build-rest-api".to_string(),
        objective: "Build REST API with tests".to_string(),
        queen_type: QueenType::Strategic,
        max_workers: 5,
        consensus_algorithm: ConsensusAlgorithm::Majority,
        auto_scale: false,
        encryption: false,
    }
}

async fn setup() -> (SwarmService, Arc<Orchestrator>) {
    let store = setup_hive_store().await;
    let swarms = Arc::new(SqliteSwarmRepository::new(store.pool().clone()));
    let agents = Arc::new(SqliteAgentRepository::new(store.pool().clone()));
    let tasks = Arc::new(SqliteTaskRepository::new(store.pool().clone()));
    let events = EventBus::new();
    let orchestrator = Arc::new(Orchestrator::new(tasks, agents.clone(), events.clone()));
    let service = SwarmService::new(swarms, agents, orchestrator.clone(), events);
    (service, orchestrator)
}

#[tokio::test]
async fn test_init_spawn_status_scenario() {
    let (service, _) = setup().await;

    let objective = "Build REST API with tests";
    let analysis = analyze_objective(objective);
    let selection = select_worker_types(None, objective, Some(&analysis));
    let roster = fill_worker_roster(&selection, 5);
    assert_eq!(roster.len(), 5);

    let (swarm, queen) = service.init_swarm(init_options()).await.expect("init failed");
    assert_eq!(queen.role, AgentRole::Queen);

    for worker_type in roster {
        service
            .spawn_worker(swarm.id, worker_type)
            .await
            .expect("worker spawn failed");
    }

    let agents = service.list_agents(swarm.id).await.unwrap();
    let workers: Vec<_> = agents.iter().filter(|a| a.role == AgentRole::Worker).collect();
    let queens: Vec<_> = agents.iter().filter(|a| a.role == AgentRole::Queen).collect();
    assert_eq!(workers.len(), 5, "Workers: 5");
    assert_eq!(queens.len(), 1, "one queen per swarm");
    assert_eq!(swarm.config.consensus_algorithm, ConsensusAlgorithm::Majority);

    // The selection stays within the closed type set and includes a
    // researcher.
    assert!(selection.iter().any(|t| *t == WorkerType::Researcher));
}

#[tokio::test]
async fn test_init_rejects_bad_worker_count() {
    let (service, _) = setup().await;
    let options = InitSwarmOptions {
        max_workers: 0,
        ..init_options()
    };
    assert!(matches!(
        service.init_swarm(options).await,
        Err(HiveError::ValidationFailed(_))
    ));

    let options = InitSwarmOptions {
        max_workers: 101,
        ..init_options()
    };
    assert!(matches!(
        service.init_swarm(options).await,
        Err(HiveError::ValidationFailed(_))
    ));
}

#[tokio::test]
async fn test_init_rejects_empty_name() {
    let (service, _) = setup().await;
    let options = InitSwarmOptions {
        name: "   ".to_string(),
        ..init_options()
    };
    assert!(service.init_swarm(options).await.is_err());
}

#[tokio::test]
async fn test_spawn_respects_max_workers() {
    let (service, _) = setup().await;
    let options = InitSwarmOptions {
        max_workers: 2,
        ..init_options()
    };
    let (swarm, _) = service.init_swarm(options).await.unwrap();

    service.spawn_worker(swarm.id, WorkerType::Coder).await.unwrap();
    service.spawn_worker(swarm.id, WorkerType::Tester).await.unwrap();
    let err = service
        .spawn_worker(swarm.id, WorkerType::Reviewer)
        .await
        .expect_err("third worker exceeds max_workers=2");
    assert!(matches!(err, HiveError::ValidationFailed(_)));
}

#[tokio::test]
async fn test_worker_capabilities_match_type_table() {
    let (service, _) = setup().await;
    let (swarm, _) = service.init_swarm(init_options()).await.unwrap();

    let analyst = service.spawn_worker(swarm.id, WorkerType::Analyst).await.unwrap();
    for capability in [
        "data-analysis",
        "pattern-recognition",
        "reporting",
        "visualization",
    ] {
        assert!(analyst.capabilities.contains(capability));
    }
}

#[tokio::test]
async fn test_pause_resume_roundtrip() {
    let (service, _) = setup().await;
    let (swarm, _) = service.init_swarm(init_options()).await.unwrap();

    let paused = service.pause_swarm(swarm.id).await.unwrap();
    assert_eq!(paused.status, SwarmStatus::Paused);

    // Spawning into a paused swarm is refused.
    assert!(service.spawn_worker(swarm.id, WorkerType::Coder).await.is_err());

    let resumed = service.resume_swarm(swarm.id).await.unwrap();
    assert_eq!(resumed.status, SwarmStatus::Active);
}

#[tokio::test]
async fn test_cancel_swarm_cascades() {
    let (service, orchestrator) = setup().await;
    let (swarm, _) = service.init_swarm(init_options()).await.unwrap();
    service.spawn_worker(swarm.id, WorkerType::Coder).await.unwrap();

    let task = orchestrator
        .create_task(CreateTaskOptions::new(swarm.id, "doomed work"))
        .await
        .unwrap();
    orchestrator.run_workflow(swarm.id).await.unwrap();

    let cancelled = service.cancel_swarm(swarm.id, "shutting down").await.unwrap();
    assert_eq!(cancelled.status, SwarmStatus::Cancelled);

    let task = orchestrator.get_task(task.id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Cancelled);

    for agent in service.list_agents(swarm.id).await.unwrap() {
        assert_eq!(agent.status, AgentStatus::Terminated);
    }

    // Cancelling again is a no-op.
    let again = service.cancel_swarm(swarm.id, "again").await.unwrap();
    assert_eq!(again.status, SwarmStatus::Cancelled);
}
