//! SQLite adapters: the Store and repository implementations.

pub mod agent_repository;
pub mod connection;
pub mod consensus_repository;
pub mod memory_repository;
pub mod migrations;
pub mod swarm_repository;
pub mod task_repository;

pub use agent_repository::SqliteAgentRepository;
pub use connection::{ConnectionError, Store, StoreConfig};
pub use consensus_repository::SqliteConsensusRepository;
pub use memory_repository::SqliteMemoryRepository;
pub use migrations::{hive_migrations, swarm_migrations, Migration, MigrationError, Migrator};
pub use swarm_repository::SqliteSwarmRepository;
pub use task_repository::SqliteTaskRepository;
