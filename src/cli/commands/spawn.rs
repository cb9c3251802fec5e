//! `spawn` command: create a swarm, its queen, and selected workers.

use anyhow::{bail, Result};
use console::style;
use serde::Serialize;

use crate::cli::output::{output, CommandOutput};
use crate::cli::HiveContext;
use crate::domain::models::{ConsensusAlgorithm, QueenType, WorkerType};
use crate::services::queen::{analyze_objective, fill_worker_roster, select_worker_types};
use crate::services::InitSwarmOptions;

#[derive(Debug, Serialize)]
struct SpawnOutput {
    swarm_id: String,
    name: String,
    objective: String,
    queen: String,
    complexity: String,
    strategy: String,
    consensus: String,
    workers: Vec<String>,
}

impl CommandOutput for SpawnOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![
            format!("{} {}", style("Swarm").bold().green(), self.name),
            format!("  id:         {}", self.swarm_id),
            format!("  objective:  {}", self.objective),
            format!("  queen:      {}", self.queen),
            format!("  complexity: {} ({})", self.complexity, self.strategy),
            format!("  consensus:  {}", self.consensus),
            format!("  workers:    {}", self.workers.len()),
        ];
        for worker in &self.workers {
            lines.push(format!("    - {worker}"));
        }
        lines.join("\n")
    }
}

#[allow(clippy::too_many_arguments)]
pub async fn handle_spawn(
    ctx: &HiveContext,
    objective: String,
    name: Option<String>,
    queen_type: &str,
    max_workers: Option<u32>,
    consensus_algorithm: &str,
    workers: &[String],
    auto_scale: bool,
    encryption: bool,
    json: bool,
) -> Result<()> {
    let queen_type = QueenType::from_str(queen_type)
        .ok_or_else(|| anyhow::anyhow!("Invalid queen type: {queen_type} (expected strategic, tactical, or adaptive)"))?;
    let consensus_algorithm = ConsensusAlgorithm::from_str(consensus_algorithm)
        .ok_or_else(|| anyhow::anyhow!("Invalid consensus algorithm: {consensus_algorithm}"))?;
    let max_workers = max_workers.unwrap_or(ctx.config.max_agents);

    let explicit: Option<Vec<WorkerType>> = if workers.is_empty() {
        None
    } else {
        let mut parsed = Vec::new();
        for raw in workers {
            match WorkerType::from_str(raw) {
                Some(t) => parsed.push(t),
                None => bail!("Unknown worker type: {raw}"),
            }
        }
        Some(parsed)
    };

    let analysis = analyze_objective(&objective);
    let selection =
        select_worker_types(explicit.as_deref(), &objective, Some(&analysis));
    let roster = fill_worker_roster(&selection, max_workers as usize);

    let name = name.unwrap_or_else(|| derive_name(&objective));
    let (swarm, swarm_queen) = ctx
        .swarm_service
        .init_swarm(InitSwarmOptions {
            name,
            objective: objective.clone(),
            queen_type,
            max_workers,
            consensus_algorithm,
            auto_scale,
            encryption,
        })
        .await?;

    let mut spawned = Vec::new();
    for worker_type in roster {
        let agent = ctx.swarm_service.spawn_worker(swarm.id, worker_type).await?;
        spawned.push(agent.name);
    }

    output(
        &SpawnOutput {
            swarm_id: swarm.id.to_string(),
            name: swarm.name,
            objective,
            queen: swarm_queen.name,
            complexity: analysis.complexity.as_str().to_string(),
            strategy: analysis.recommended_strategy.as_str().to_string(),
            consensus: consensus_algorithm.as_str().to_string(),
            workers: spawned,
        },
        json,
    );
    Ok(())
}

/// Derive a short swarm name from the objective's leading words.
fn derive_name(objective: &str) -> String {
    let words: Vec<&str> = objective.split_whitespace().take(3).collect();
    if words.is_empty() {
        "swarm".to_string()
    } else {
        words.join("-").to_lowercase()
    }
}
