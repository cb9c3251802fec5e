//! Hivemind - collective-intelligence orchestrator
//!
//! Coordinates a dynamic pool of worker agents against a user-supplied
//! objective:
//! - Swarm, agent, and task lifecycle with capability-based dispatch
//! - Dependency-aware hook engine with per-resource locks and a
//!   single-flighted execution queue
//! - Consensus voting across majority/weighted/quorum/unanimous algorithms
//! - SQLite-backed persistent store with WAL mode and an LRU-cached
//!   shared memory layer

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export key types for convenience
pub use adapters::sqlite::Store;
pub use domain::errors::{HiveError, HiveResult};
