//! CLI interface: command definitions, handlers, and output formatting.

pub mod commands;
pub mod output;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::adapters::sqlite::{
    hive_migrations, swarm_migrations, Migrator, SqliteAgentRepository,
    SqliteConsensusRepository, SqliteMemoryRepository, SqliteSwarmRepository,
    SqliteTaskRepository, Store,
};
use crate::infrastructure::config::HiveConfig;
use crate::services::{
    ConsensusService, EventBus, Orchestrator, SharedMemory, SwarmService,
};

#[derive(Parser, Debug)]
#[command(
    name = "hivemind",
    about = "Collective-intelligence orchestrator: swarms, hooks, shared memory",
    version
)]
pub struct Cli {
    /// Emit machine-readable JSON instead of human output
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the databases, apply migrations, and write config.json
    Init {
        /// Recreate databases even if they already exist
        #[arg(long)]
        force: bool,
    },
    /// Create a swarm with a queen and workers for an objective
    Spawn {
        /// The objective the swarm pursues
        objective: String,
        /// Swarm name (derived from the objective when omitted)
        #[arg(long)]
        name: Option<String>,
        /// Queen type: strategic, tactical, adaptive
        #[arg(long, default_value = "strategic")]
        queen_type: String,
        /// Maximum worker count (1-100)
        #[arg(long)]
        max_workers: Option<u32>,
        /// Consensus algorithm: majority, weighted, quorum, unanimous
        #[arg(long, default_value = "majority")]
        consensus_algorithm: String,
        /// Explicit comma-separated worker types, bypassing selection
        #[arg(long, value_delimiter = ',')]
        workers: Vec<String>,
        /// Allow the orchestrator to scale workers
        #[arg(long)]
        auto_scale: bool,
        /// Record the encryption toggle
        #[arg(long)]
        encryption: bool,
    },
    /// List active swarms with agent, task, memory, and consensus counts
    Status {
        /// Include per-swarm agent tables
        #[arg(long, short)]
        verbose: bool,
    },
    /// List recent decisions, or create one with --decide
    Consensus {
        /// Topic for a new decision
        #[arg(long)]
        decide: Option<String>,
        /// Options for a new decision
        #[arg(long, value_delimiter = ',')]
        options: Vec<String>,
        /// Algorithm: majority, weighted, quorum, unanimous
        #[arg(long, default_value = "majority")]
        algorithm: String,
        /// Proposal type: strategic, tactical, operational
        #[arg(long, default_value = "tactical")]
        proposal_type: String,
        /// Queen type for an ad-hoc swarm when none exists
        #[arg(long, default_value = "strategic")]
        queen_type: String,
        /// Number of eligible voters (defaults to the swarm's agent count)
        #[arg(long)]
        agents: Option<u64>,
        /// How many recent decisions to list
        #[arg(long, default_value = "10")]
        limit: usize,
    },
    /// Operate on shared memory
    Memory {
        #[command(subcommand)]
        command: MemoryCommands,
    },
    /// Aggregate task and agent statistics
    Metrics,
}

#[derive(Subcommand, Debug)]
pub enum MemoryCommands {
    /// Store a value under a key
    Store {
        key: String,
        value: String,
        #[arg(long, short, default_value = crate::services::DEFAULT_NAMESPACE)]
        namespace: String,
        /// Time to live in seconds
        #[arg(long)]
        ttl: Option<u64>,
        /// Comma-separated tags
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
    },
    /// List entries in a namespace
    List {
        #[arg(long, short, default_value = crate::services::DEFAULT_NAMESPACE)]
        namespace: String,
        #[arg(long, default_value = "20")]
        limit: usize,
        #[arg(long, default_value = "0")]
        offset: usize,
    },
    /// Search entries by key pattern (* wildcard) and tags
    Search {
        pattern: String,
        #[arg(long, short)]
        namespace: Option<String>,
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Per-namespace counts and cache statistics
    Stats,
    /// Delete expired entries now
    Clean,
    /// Export entries to a JSON file
    Export {
        /// Output path
        file: String,
        #[arg(long, short)]
        namespace: Option<String>,
    },
}

/// Wired-up services over the two stores.
pub struct HiveContext {
    pub config: HiveConfig,
    pub hive_store: Store,
    pub swarm_store: Store,
    pub events: EventBus,
    pub swarm_service: SwarmService,
    pub orchestrator: Arc<Orchestrator>,
    pub consensus: ConsensusService,
    pub memory: SharedMemory,
}

impl HiveContext {
    /// Open both stores, apply pending migrations, and wire the services.
    pub async fn connect(config: HiveConfig) -> Result<Self> {
        let hive_store = Store::open(config.hive_db_path())
            .await
            .context("Failed to open hive database (run `hivemind init` first?)")?;
        let swarm_store = Store::open(config.swarm_db_path())
            .await
            .context("Failed to open swarm database (run `hivemind init` first?)")?;

        Migrator::new(hive_store.pool().clone())
            .run(&hive_migrations())
            .await
            .context("Hive database migration failed")?;
        Migrator::new(swarm_store.pool().clone())
            .run(&swarm_migrations())
            .await
            .context("Swarm database migration failed")?;

        let events = EventBus::new();

        let swarms = Arc::new(SqliteSwarmRepository::new(hive_store.pool().clone()));
        let agents = Arc::new(SqliteAgentRepository::new(hive_store.pool().clone()));
        let tasks = Arc::new(SqliteTaskRepository::new(hive_store.pool().clone()));
        let decisions = Arc::new(SqliteConsensusRepository::new(hive_store.pool().clone()));
        let memory_repo = Arc::new(SqliteMemoryRepository::new(swarm_store.pool().clone()));
        let collective_repo =
            Arc::new(SqliteMemoryRepository::collective(hive_store.pool().clone()));

        let orchestrator = Arc::new(
            Orchestrator::new(tasks, agents.clone(), events.clone())
                .with_max_concurrent_tasks(config.max_concurrent_tasks),
        );
        let swarm_service =
            SwarmService::new(swarms, agents, orchestrator.clone(), events.clone());
        let collective_memory =
            Arc::new(SharedMemory::new(collective_repo, events.clone()));
        let consensus = ConsensusService::new(decisions, events.clone())
            .with_collective_memory(collective_memory);
        let memory = SharedMemory::new(memory_repo, events.clone());

        Ok(Self {
            config,
            hive_store,
            swarm_store,
            events,
            swarm_service,
            orchestrator,
            consensus,
            memory,
        })
    }

    /// Checkpoint and close both stores.
    pub async fn close(self) -> Result<()> {
        self.hive_store.close().await?;
        self.swarm_store.close().await?;
        Ok(())
    }
}
