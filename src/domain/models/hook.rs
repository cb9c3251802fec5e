//! Hook domain model.
//!
//! Hooks are lifecycle side-effect points (pre-task, post-edit, …) executed
//! through the hook queue under the coordinator's locks and dependency
//! gates. The dependency graph is a fixed table, overridable only at
//! construction time for testing.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// Fixed enumeration of hook points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HookType {
    PreTask,
    PreEdit,
    PreRead,
    PreBash,
    PostEdit,
    PostTask,
    Notify,
    SessionRestore,
    SessionEnd,
}

impl HookType {
    pub const ALL: [HookType; 9] = [
        Self::PreTask,
        Self::PreEdit,
        Self::PreRead,
        Self::PreBash,
        Self::PostEdit,
        Self::PostTask,
        Self::Notify,
        Self::SessionRestore,
        Self::SessionEnd,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PreTask => "pre-task",
            Self::PreEdit => "pre-edit",
            Self::PreRead => "pre-read",
            Self::PreBash => "pre-bash",
            Self::PostEdit => "post-edit",
            Self::PostTask => "post-task",
            Self::Notify => "notify",
            Self::SessionRestore => "session-restore",
            Self::SessionEnd => "session-end",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pre-task" => Some(Self::PreTask),
            "pre-edit" => Some(Self::PreEdit),
            "pre-read" => Some(Self::PreRead),
            "pre-bash" => Some(Self::PreBash),
            "post-edit" => Some(Self::PostEdit),
            "post-task" => Some(Self::PostTask),
            "notify" => Some(Self::Notify),
            "session-restore" => Some(Self::SessionRestore),
            "session-end" => Some(Self::SessionEnd),
            _ => None,
        }
    }

    /// Hard execution timeout for this hook type.
    pub fn timeout(&self) -> std::time::Duration {
        let secs = match self {
            Self::PreTask => 5,
            Self::PreEdit => 2,
            Self::PreRead => 1,
            Self::PreBash => 2,
            Self::PostEdit => 3,
            Self::PostTask => 10,
            Self::Notify => 1,
            Self::SessionRestore => 15,
            Self::SessionEnd => 20,
        };
        std::time::Duration::from_secs(secs)
    }
}

impl std::fmt::Display for HookType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Queue priority; `High` sorts before `Medium` before `Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookPriority {
    High = 0,
    Medium = 1,
    Low = 2,
}

impl Default for HookPriority {
    fn default() -> Self {
        Self::Medium
    }
}

impl HookPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }
}

/// Flag/value arguments passed to a hook invocation.
///
/// Rendered onto the worker's command line as `--flag value` pairs in
/// sorted order, so an invocation serializes deterministically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookArgs(pub BTreeMap<String, String>);

impl HookArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, flag: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(flag.into(), value.into());
        self
    }

    pub fn get(&self, flag: &str) -> Option<&str> {
        self.0.get(flag).map(String::as_str)
    }

    /// Render as the `--flag value …` tail of a worker command line.
    pub fn to_command_tail(&self) -> String {
        let mut out = String::new();
        for (flag, value) in &self.0 {
            out.push_str(" --");
            out.push_str(flag);
            out.push(' ');
            out.push_str(value);
        }
        out
    }
}

/// Status of a queued hook task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookTaskStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

/// A queued hook invocation with retry accounting.
#[derive(Debug, Clone)]
pub struct HookTask {
    pub id: Uuid,
    pub hook_type: HookType,
    pub args: HookArgs,
    pub priority: HookPriority,
    pub created_at: DateTime<Utc>,
    /// 1-based attempt counter; monotonically increases across retries.
    pub attempt: u32,
    pub status: HookTaskStatus,
}

impl HookTask {
    pub fn new(hook_type: HookType, args: HookArgs, priority: HookPriority) -> Self {
        Self {
            id: Uuid::new_v4(),
            hook_type,
            args,
            priority,
            created_at: Utc::now(),
            attempt: 0,
            status: HookTaskStatus::Queued,
        }
    }
}

/// Status of a coordinated execution record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// In-memory record of a coordinated hook in flight.
///
/// Completed records are retained briefly for dependency satisfaction
/// checks, then reaped by the cleanup loop when stale.
#[derive(Debug, Clone)]
pub struct HookExecution {
    pub exec_id: Uuid,
    pub hook_type: HookType,
    pub process_id: u32,
    pub deps: Vec<HookType>,
    pub status: HookExecutionStatus,
    pub start_time: DateTime<Utc>,
}

impl HookExecution {
    pub fn new(hook_type: HookType, process_id: u32, deps: Vec<HookType>) -> Self {
        Self {
            exec_id: Uuid::new_v4(),
            hook_type,
            process_id,
            deps,
            status: HookExecutionStatus::Pending,
            start_time: Utc::now(),
        }
    }

    /// Whether this record is older than the staleness horizon.
    pub fn is_stale(&self, now: DateTime<Utc>, horizon: Duration) -> bool {
        now - self.start_time > horizon
    }
}

/// A short-lived advisory lock on a resource key.
///
/// At most one live lock exists per key; expired locks are invisible to
/// acquirers and reclaimable.
#[derive(Debug, Clone)]
pub struct CoordinationLock {
    pub lock_id: Uuid,
    pub owner_process_id: u32,
    pub resource_key: String,
    pub hook_type: HookType,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CoordinationLock {
    pub fn new(resource_key: impl Into<String>, hook_type: HookType, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            lock_id: Uuid::new_v4(),
            owner_process_id: std::process::id(),
            resource_key: resource_key.into(),
            hook_type,
            acquired_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// Dependency edges and default priority for one hook type.
#[derive(Debug, Clone, Default)]
pub struct HookDependencies {
    /// Types that must have completed (or not be running) before this one runs.
    pub depends_on: Vec<HookType>,
    /// Types whose concurrent run this one would block.
    pub blocked_by: Vec<HookType>,
    pub priority: HookPriority,
}

/// The static hook dependency graph, keyed by hook type.
pub type HookGraph = HashMap<HookType, HookDependencies>;

/// Built-in dependency table.
pub fn default_hook_graph() -> HookGraph {
    use HookPriority::{High, Low, Medium};
    use HookType::{
        Notify, PostEdit, PostTask, PreBash, PreEdit, PreRead, PreTask, SessionEnd,
        SessionRestore,
    };

    let mut graph = HookGraph::new();
    let mut insert = |hook: HookType,
                      depends_on: Vec<HookType>,
                      blocked_by: Vec<HookType>,
                      priority: HookPriority| {
        graph.insert(
            hook,
            HookDependencies {
                depends_on,
                blocked_by,
                priority,
            },
        );
    };

    insert(PreTask, vec![], vec![], High);
    insert(PreBash, vec![], vec![], High);
    insert(PreEdit, vec![PreTask], vec![PostEdit], High);
    insert(PreRead, vec![], vec![], Low);
    insert(PostEdit, vec![PreEdit], vec![PostTask], Medium);
    insert(PostTask, vec![PreTask], vec![], Medium);
    insert(Notify, vec![], vec![], Low);
    insert(SessionRestore, vec![], vec![SessionEnd], High);
    insert(SessionEnd, vec![SessionRestore], vec![], Medium);
    graph
}

/// Detect whether following `depends_on` edges from `start` revisits a node.
pub fn has_cycle(graph: &HookGraph, start: HookType) -> bool {
    fn visit(
        graph: &HookGraph,
        node: HookType,
        path: &mut Vec<HookType>,
    ) -> bool {
        if path.contains(&node) {
            return true;
        }
        path.push(node);
        if let Some(deps) = graph.get(&node) {
            for dep in &deps.depends_on {
                if visit(graph, *dep, path) {
                    return true;
                }
            }
        }
        path.pop();
        false
    }

    let mut path = Vec::new();
    path.push(start);
    if let Some(deps) = graph.get(&start) {
        for dep in &deps.depends_on {
            if visit(graph, *dep, &mut path) {
                return true;
            }
        }
    }
    false
}

/// Captured output of a finished hook attempt.
///
/// Hooks write to an explicit buffer rather than intercepted global
/// streams; the coordinator reads the result from here.
#[derive(Debug, Clone, Default)]
pub struct HookOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration: std::time::Duration,
}

impl HookOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ordering_high_first() {
        assert!(HookPriority::High < HookPriority::Medium);
        assert!(HookPriority::Medium < HookPriority::Low);
    }

    #[test]
    fn test_timeout_table() {
        assert_eq!(HookType::PreTask.timeout().as_secs(), 5);
        assert_eq!(HookType::Notify.timeout().as_secs(), 1);
        assert_eq!(HookType::SessionEnd.timeout().as_secs(), 20);
    }

    #[test]
    fn test_hook_type_roundtrip() {
        for hook in HookType::ALL {
            assert_eq!(HookType::from_str(hook.as_str()), Some(hook));
        }
    }

    #[test]
    fn test_default_graph_is_acyclic() {
        let graph = default_hook_graph();
        for hook in HookType::ALL {
            assert!(!has_cycle(&graph, hook), "cycle found from {hook}");
        }
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let mut graph = default_hook_graph();
        graph.get_mut(&HookType::PostEdit).unwrap().depends_on = vec![HookType::PostEdit];
        assert!(has_cycle(&graph, HookType::PostEdit));
    }

    #[test]
    fn test_two_node_cycle_detected() {
        let mut graph = default_hook_graph();
        graph.get_mut(&HookType::PreTask).unwrap().depends_on = vec![HookType::PostTask];
        // post-task already depends on pre-task
        assert!(has_cycle(&graph, HookType::PostTask));
        assert!(has_cycle(&graph, HookType::PreTask));
    }

    #[test]
    fn test_lock_expiry() {
        let lock = CoordinationLock::new("post-edit", HookType::PostEdit, Duration::seconds(30));
        assert!(!lock.is_expired());
        let stale =
            CoordinationLock::new("post-edit", HookType::PostEdit, Duration::seconds(-1));
        assert!(stale.is_expired());
    }

    #[test]
    fn test_args_render_sorted() {
        let args = HookArgs::new().set("file", "src/main.rs").set("agent", "coder-1");
        assert_eq!(args.to_command_tail(), " --agent coder-1 --file src/main.rs");
    }
}
