//! Domain models for the hivemind system.

pub mod agent;
pub mod consensus;
pub mod hook;
pub mod memory;
pub mod swarm;
pub mod task;

pub use agent::{Agent, AgentMetrics, AgentRole, AgentStatus, WorkerType};
pub use consensus::{
    ConsensusAlgorithm, ConsensusDecision, ConsensusResult, ProposalType, TallyOutcome, Vote,
    VoteChoice, VoteDetail, VotesBlob,
};
pub use hook::{
    default_hook_graph, has_cycle, CoordinationLock, HookArgs, HookDependencies, HookExecution,
    HookExecutionStatus, HookGraph, HookOutput, HookPriority, HookTask, HookTaskStatus, HookType,
};
pub use memory::{
    CacheStats, MemoryEntry, MemoryEntryType, MemorySearch, MemoryStats, MemoryValue,
    NamespaceStats,
};
pub use swarm::{QueenType, Swarm, SwarmConfig, SwarmStatus};
pub use task::{
    DependencyKind, ResourceRequirement, Task, TaskDependency, TaskMetadata, TaskSchedule,
    TaskStatus,
};
