//! Service layer: swarm coordination, hook engine, shared memory.

pub mod consensus_service;
pub mod event_bus;
pub mod hook_coordinator;
pub mod hook_queue;
pub mod lru_cache;
pub mod orchestrator;
pub mod process_pool;
pub mod queen;
pub mod runtime;
pub mod shared_memory;
pub mod swarm_service;

pub use consensus_service::{ConsensusService, VoteOptions, VoteOutcome};
pub use event_bus::{EventBus, HookEvent, MemoryEvent, SwarmEvent};
pub use hook_coordinator::{CoordinateOptions, HookCoordinator, HookCoordinatorConfig};
pub use hook_queue::{HookQueue, HookQueueConfig, HookTicket, HookTypeStats};
pub use lru_cache::{LruCache, LruCacheConfig};
pub use orchestrator::{CreateTaskOptions, Orchestrator, TaskUpdate};
pub use process_pool::{ProcessPool, ProcessPoolConfig, COMPLETION_SENTINEL};
pub use queen::{analyze_objective, fill_worker_roster, select_worker_types, ObjectiveAnalysis};
pub use runtime::Runtime;
pub use shared_memory::{SharedMemory, StoreOptions, DEFAULT_NAMESPACE};
pub use swarm_service::{InitSwarmOptions, SwarmService};
