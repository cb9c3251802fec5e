//! Queen analysis and worker-type selection.
//!
//! The queen reduces an objective to required worker types and a complexity
//! estimate; the selector turns that into the concrete worker set. Both are
//! pure functions of their inputs, so a given objective and flag set always
//! yields the same selection.

use serde::{Deserialize, Serialize};

use crate::domain::models::WorkerType;

/// Complexity classification of an objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl Complexity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::VeryHigh => "very_high",
        }
    }
}

/// Execution strategy the queen recommends for the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Few workers, sequential emphasis.
    Focused,
    /// Mixed parallel/sequential.
    Balanced,
    /// Wide fan-out across workers.
    Parallel,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Focused => "focused",
            Self::Balanced => "balanced",
            Self::Parallel => "parallel",
        }
    }
}

/// What the queen concluded about an objective.
#[derive(Debug, Clone)]
pub struct ObjectiveAnalysis {
    /// Worker types the objective directly calls for, in detection order.
    pub required_capabilities: Vec<WorkerType>,
    pub complexity: Complexity,
    pub recommended_strategy: Strategy,
}

const SCALE_KEYWORDS: [&str; 4] = ["enterprise", "production", "scale", "security"];
const API_KEYWORDS: [&str; 4] = ["api", "backend", "service", "endpoint"];
const FRONTEND_KEYWORDS: [&str; 4] = ["frontend", "ui", "interface", "web"];
const DATA_KEYWORDS: [&str; 4] = ["database", "data", "storage", "analytics"];
const DOC_KEYWORDS: [&str; 3] = ["document", "guide", "readme"];
const REVIEW_KEYWORDS: [&str; 3] = ["review", "audit", "refactor"];

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// Analyze an objective into capabilities, complexity, and strategy.
pub fn analyze_objective(objective: &str) -> ObjectiveAnalysis {
    let lowered = objective.to_lowercase();
    let word_count = lowered.split_whitespace().count();

    let mut required = Vec::new();
    let mut push = |t: WorkerType, v: &mut Vec<WorkerType>| {
        if !v.contains(&t) {
            v.push(t);
        }
    };

    if contains_any(&lowered, &API_KEYWORDS) {
        push(WorkerType::Coder, &mut required);
        push(WorkerType::Tester, &mut required);
    }
    if contains_any(&lowered, &FRONTEND_KEYWORDS) {
        push(WorkerType::Coder, &mut required);
        push(WorkerType::Reviewer, &mut required);
    }
    if contains_any(&lowered, &DATA_KEYWORDS) {
        push(WorkerType::Analyst, &mut required);
        push(WorkerType::Architect, &mut required);
    }
    if contains_any(&lowered, &DOC_KEYWORDS) {
        push(WorkerType::Documenter, &mut required);
    }
    if contains_any(&lowered, &REVIEW_KEYWORDS) {
        push(WorkerType::Reviewer, &mut required);
    }
    if contains_any(&lowered, &["test", "quality", "validate"]) {
        push(WorkerType::Tester, &mut required);
    }
    if contains_any(&lowered, &["research", "investigate", "explore", "analyze"]) {
        push(WorkerType::Researcher, &mut required);
    }

    let keyword_domains = [
        contains_any(&lowered, &API_KEYWORDS),
        contains_any(&lowered, &FRONTEND_KEYWORDS),
        contains_any(&lowered, &DATA_KEYWORDS),
        contains_any(&lowered, &SCALE_KEYWORDS),
    ]
    .iter()
    .filter(|hit| **hit)
    .count();

    let complexity = if contains_any(&lowered, &SCALE_KEYWORDS) && keyword_domains >= 2 {
        Complexity::VeryHigh
    } else if contains_any(&lowered, &SCALE_KEYWORDS) || keyword_domains >= 2 || word_count > 20 {
        Complexity::High
    } else if keyword_domains == 1 || word_count > 6 {
        Complexity::Medium
    } else {
        Complexity::Low
    };

    let recommended_strategy = match complexity {
        Complexity::Low => Strategy::Focused,
        Complexity::Medium => Strategy::Balanced,
        Complexity::High | Complexity::VeryHigh => Strategy::Parallel,
    };

    ObjectiveAnalysis {
        required_capabilities: required,
        complexity,
        recommended_strategy,
    }
}

/// Select the worker types for a swarm.
///
/// An explicit caller-supplied list wins unchanged. Otherwise the queen's
/// required capabilities are extended by keyword rules, topped up to at
/// least three, and truncated to at most eight in priority order. When the
/// queen's analysis is unavailable, a keyword-only pass seeded with
/// {researcher, coder, tester} is used instead.
pub fn select_worker_types(
    explicit: Option<&[WorkerType]>,
    objective: &str,
    analysis: Option<&ObjectiveAnalysis>,
) -> Vec<WorkerType> {
    if let Some(explicit) = explicit {
        return explicit.to_vec();
    }

    let lowered = objective.to_lowercase();
    let mut selected: Vec<WorkerType> = Vec::new();
    let mut add = |t: WorkerType, v: &mut Vec<WorkerType>| {
        if !v.contains(&t) {
            v.push(t);
        }
    };

    let seeded_fallback = analysis.is_none();
    if let Some(analysis) = analysis {
        for t in &analysis.required_capabilities {
            add(*t, &mut selected);
        }
    } else {
        for t in [WorkerType::Researcher, WorkerType::Coder, WorkerType::Tester] {
            add(t, &mut selected);
        }
    }

    if contains_any(&lowered, &DOC_KEYWORDS) {
        add(WorkerType::Documenter, &mut selected);
    }
    let non_low_complexity =
        matches!(analysis, Some(a) if a.complexity != Complexity::Low);
    if contains_any(&lowered, &REVIEW_KEYWORDS) || non_low_complexity {
        add(WorkerType::Reviewer, &mut selected);
    }
    if contains_any(&lowered, &SCALE_KEYWORDS) {
        add(WorkerType::Architect, &mut selected);
        add(WorkerType::Optimizer, &mut selected);
        add(WorkerType::Tester, &mut selected);
    }
    if contains_any(&lowered, &API_KEYWORDS) {
        add(WorkerType::Coder, &mut selected);
        add(WorkerType::Tester, &mut selected);
    }
    if contains_any(&lowered, &FRONTEND_KEYWORDS) {
        add(WorkerType::Coder, &mut selected);
        add(WorkerType::Reviewer, &mut selected);
    }
    if contains_any(&lowered, &DATA_KEYWORDS) {
        add(WorkerType::Analyst, &mut selected);
        add(WorkerType::Architect, &mut selected);
    }
    add(WorkerType::Researcher, &mut selected);

    // Top up thin selections in the fixed order.
    if selected.len() < 3 {
        for t in [WorkerType::Researcher, WorkerType::Coder, WorkerType::Tester] {
            add(t, &mut selected);
            if selected.len() >= 3 {
                break;
            }
        }
    }

    // Truncate oversized selections along the priority order: the queen's
    // own requirements first, then the fixed ranking.
    if selected.len() > 8 {
        let mut priority: Vec<WorkerType> = Vec::new();
        if let Some(analysis) = analysis {
            for t in &analysis.required_capabilities {
                add(*t, &mut priority);
            }
        }
        for t in WorkerType::ALL {
            add(t, &mut priority);
        }
        selected = priority
            .into_iter()
            .filter(|t| selected.contains(t))
            .take(8)
            .collect();
    }

    debug_assert!(!seeded_fallback || selected.len() >= 3);
    selected
}

/// Extend a selection to `count` types by cycling the priority order.
///
/// Used when the swarm's `max_workers` exceeds the distinct type count; the
/// extra workers reuse types in ranking order.
pub fn fill_worker_roster(selection: &[WorkerType], count: usize) -> Vec<WorkerType> {
    let mut roster: Vec<WorkerType> = selection.iter().copied().take(count).collect();
    let mut ranked = WorkerType::ALL
        .iter()
        .copied()
        .filter(|t| !roster.contains(t))
        .collect::<Vec<_>>()
        .into_iter();
    while roster.len() < count {
        match ranked.next() {
            Some(t) => roster.push(t),
            None => {
                // Every type used once; cycle the selection.
                let idx = roster.len() % selection.len().max(1);
                roster.push(*selection.get(idx).unwrap_or(&WorkerType::Researcher));
            }
        }
    }
    roster
}
