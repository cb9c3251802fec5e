//! Typed event channels.
//!
//! Three broadcast channels (swarm, hook, memory) carry tagged variants.
//! Consumers subscribe per channel; events are published in the order of
//! the state transitions that produced them. Lagging subscribers drop old
//! events rather than blocking publishers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::domain::models::{HookPriority, HookType, SwarmStatus, TaskStatus};

const CHANNEL_CAPACITY: usize = 256;

/// Swarm-channel events: swarm, agent, task, and consensus transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum SwarmEvent {
    SwarmCreated {
        swarm_id: Uuid,
        name: String,
    },
    SwarmStatusChanged {
        swarm_id: Uuid,
        status: SwarmStatus,
    },
    AgentSpawned {
        swarm_id: Uuid,
        agent_id: Uuid,
        name: String,
    },
    TaskCreated {
        swarm_id: Uuid,
        task_id: Uuid,
    },
    TaskStatusChanged {
        task_id: Uuid,
        status: TaskStatus,
        progress: u8,
    },
    TaskAssigned {
        task_id: Uuid,
        agent_id: Uuid,
    },
    ConsensusProposed {
        decision_id: Uuid,
        topic: String,
    },
    ConsensusResolved {
        decision_id: Uuid,
        result: String,
        confidence: f64,
    },
}

/// Hook-channel events: one per queue transition, plus timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum HookEvent {
    Queued {
        task_id: Uuid,
        hook_type: HookType,
        priority: HookPriority,
    },
    Started {
        task_id: Uuid,
        hook_type: HookType,
        attempt: u32,
    },
    Completed {
        task_id: Uuid,
        hook_type: HookType,
        duration_ms: u64,
    },
    Retried {
        task_id: Uuid,
        hook_type: HookType,
        attempt: u32,
        error: String,
    },
    Failed {
        task_id: Uuid,
        hook_type: HookType,
        attempts: u32,
        error: String,
    },
}

/// Memory-channel events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum MemoryEvent {
    Stored {
        namespace: String,
        key: String,
        size: u64,
        compressed: bool,
    },
    Deleted {
        namespace: String,
        key: String,
    },
    NamespaceCleared {
        namespace: String,
        removed: u64,
    },
    GcCompleted {
        cleaned: u64,
        at: DateTime<Utc>,
    },
}

/// The process-wide event bus.
///
/// Cloning is cheap; all clones publish into the same channels.
#[derive(Debug, Clone)]
pub struct EventBus {
    swarm_tx: broadcast::Sender<SwarmEvent>,
    hook_tx: broadcast::Sender<HookEvent>,
    memory_tx: broadcast::Sender<MemoryEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (swarm_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (hook_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (memory_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            swarm_tx,
            hook_tx,
            memory_tx,
        }
    }

    pub fn publish_swarm(&self, event: SwarmEvent) {
        // A send error only means nobody is subscribed.
        let _ = self.swarm_tx.send(event);
    }

    pub fn publish_hook(&self, event: HookEvent) {
        let _ = self.hook_tx.send(event);
    }

    pub fn publish_memory(&self, event: MemoryEvent) {
        let _ = self.memory_tx.send(event);
    }

    pub fn subscribe_swarm(&self) -> broadcast::Receiver<SwarmEvent> {
        self.swarm_tx.subscribe()
    }

    pub fn subscribe_hook(&self) -> broadcast::Receiver<HookEvent> {
        self.hook_tx.subscribe()
    }

    pub fn subscribe_memory(&self) -> broadcast::Receiver<MemoryEvent> {
        self.memory_tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
