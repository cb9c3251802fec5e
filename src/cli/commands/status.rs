//! `status` command: active swarms with agent, task, memory, and consensus
//! counts.

use anyhow::Result;
use comfy_table::{presets::UTF8_FULL_CONDENSED, Table};
use serde::Serialize;

use crate::cli::output::{output, truncate, CommandOutput};
use crate::cli::HiveContext;
use crate::domain::models::{AgentRole, SwarmStatus, TaskStatus};

#[derive(Debug, Serialize)]
struct SwarmStatusLine {
    id: String,
    name: String,
    queen_type: String,
    status: String,
    workers: usize,
    consensus: String,
    tasks: TaskHistogram,
}

#[derive(Debug, Default, Serialize)]
struct TaskHistogram {
    queued: u64,
    running: u64,
    completed: u64,
    failed: u64,
    cancelled: u64,
}

#[derive(Debug, Serialize)]
struct AgentLine {
    name: String,
    status: String,
    workload: f64,
    tasks: usize,
}

#[derive(Debug, Serialize)]
struct StatusOutput {
    swarms: Vec<SwarmStatusLine>,
    memory_entries: u64,
    consensus_decisions: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    agents: Option<Vec<(String, Vec<AgentLine>)>>,
}

impl CommandOutput for StatusOutput {
    fn to_human(&self) -> String {
        if self.swarms.is_empty() {
            return format!(
                "No active swarms.\nMemory entries: {}  Consensus decisions: {}",
                self.memory_entries, self.consensus_decisions
            );
        }

        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED).set_header(vec![
            "ID", "Name", "Queen", "Status", "Workers", "Consensus", "Tasks (q/r/c/f/x)",
        ]);
        for swarm in &self.swarms {
            table.add_row(vec![
                truncate(&swarm.id, 8),
                truncate(&swarm.name, 24),
                swarm.queen_type.clone(),
                swarm.status.clone(),
                swarm.workers.to_string(),
                swarm.consensus.clone(),
                format!(
                    "{}/{}/{}/{}/{}",
                    swarm.tasks.queued,
                    swarm.tasks.running,
                    swarm.tasks.completed,
                    swarm.tasks.failed,
                    swarm.tasks.cancelled
                ),
            ]);
        }

        let mut out = table.to_string();
        out.push_str(&format!(
            "\nMemory entries: {}  Consensus decisions: {}",
            self.memory_entries, self.consensus_decisions
        ));

        if let Some(agents) = &self.agents {
            for (swarm_name, lines) in agents {
                out.push_str(&format!("\n\nAgents of {swarm_name}:"));
                for agent in lines {
                    out.push_str(&format!(
                        "\n  {:<24} {:<10} workload {:.2}  tasks {}",
                        agent.name, agent.status, agent.workload, agent.tasks
                    ));
                }
            }
        }
        out
    }
}

pub async fn handle_status(ctx: &HiveContext, verbose: bool, json: bool) -> Result<()> {
    let swarms = ctx
        .swarm_service
        .list_swarms(Some(SwarmStatus::Active))
        .await?;

    let mut lines = Vec::new();
    let mut agent_tables = Vec::new();
    for swarm in &swarms {
        let agents = ctx.swarm_service.list_agents(swarm.id).await?;
        let workers = agents
            .iter()
            .filter(|a| a.role == AgentRole::Worker)
            .count();
        let counts = ctx.orchestrator.status_counts(Some(swarm.id)).await?;
        let histogram = TaskHistogram {
            queued: counts.get(&TaskStatus::Queued).copied().unwrap_or(0),
            running: counts.get(&TaskStatus::Running).copied().unwrap_or(0),
            completed: counts.get(&TaskStatus::Completed).copied().unwrap_or(0),
            failed: counts.get(&TaskStatus::Failed).copied().unwrap_or(0),
            cancelled: counts.get(&TaskStatus::Cancelled).copied().unwrap_or(0),
        };
        lines.push(SwarmStatusLine {
            id: swarm.id.to_string(),
            name: swarm.name.clone(),
            queen_type: swarm.queen_type.as_str().to_string(),
            status: swarm.status.as_str().to_string(),
            workers,
            consensus: swarm.config.consensus_algorithm.as_str().to_string(),
            tasks: histogram,
        });
        if verbose {
            agent_tables.push((
                swarm.name.clone(),
                agents
                    .iter()
                    .map(|a| AgentLine {
                        name: a.name.clone(),
                        status: a.status.as_str().to_string(),
                        workload: a.workload,
                        tasks: a.current_tasks.len(),
                    })
                    .collect(),
            ));
        }
    }

    let memory_stats = ctx.memory.stats().await?;
    let decisions = ctx.consensus.count(None).await?;

    output(
        &StatusOutput {
            swarms: lines,
            memory_entries: memory_stats.total_entries,
            consensus_decisions: decisions,
            agents: verbose.then_some(agent_tables),
        },
        json,
    );
    Ok(())
}
