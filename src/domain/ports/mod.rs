//! Domain ports (interfaces) for the hivemind system.

pub mod agent_repository;
pub mod consensus_repository;
pub mod hook_runner;
pub mod memory_repository;
pub mod swarm_repository;
pub mod task_repository;

pub use agent_repository::AgentRepository;
pub use consensus_repository::ConsensusRepository;
pub use hook_runner::HookRunner;
pub use memory_repository::MemoryRepository;
pub use swarm_repository::SwarmRepository;
pub use task_repository::{TaskFilter, TaskRepository};
