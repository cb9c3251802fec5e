//! `metrics` command: aggregate task and agent statistics.

use anyhow::Result;
use serde::Serialize;

use crate::cli::output::{output, CommandOutput};
use crate::cli::HiveContext;
use crate::domain::models::{AgentRole, TaskStatus};

#[derive(Debug, Default, Serialize)]
struct MetricsOutput {
    swarms: usize,
    agents: usize,
    queens: usize,
    tasks_total: u64,
    tasks_queued: u64,
    tasks_running: u64,
    tasks_completed: u64,
    tasks_failed: u64,
    tasks_cancelled: u64,
    avg_workload: f64,
    agent_tasks_completed: u64,
    agent_tasks_failed: u64,
}

impl CommandOutput for MetricsOutput {
    fn to_human(&self) -> String {
        format!(
            "Swarms: {}  Agents: {} ({} queen(s))\n\
             Tasks: {} total ({} queued, {} running, {} completed, {} failed, {} cancelled)\n\
             Agents: avg workload {:.2}, {} task(s) completed, {} failed",
            self.swarms,
            self.agents,
            self.queens,
            self.tasks_total,
            self.tasks_queued,
            self.tasks_running,
            self.tasks_completed,
            self.tasks_failed,
            self.tasks_cancelled,
            self.avg_workload,
            self.agent_tasks_completed,
            self.agent_tasks_failed,
        )
    }
}

pub async fn handle_metrics(ctx: &HiveContext, json: bool) -> Result<()> {
    let swarms = ctx.swarm_service.list_swarms(None).await?;
    let counts = ctx.orchestrator.status_counts(None).await?;

    let mut metrics = MetricsOutput {
        swarms: swarms.len(),
        tasks_queued: counts.get(&TaskStatus::Queued).copied().unwrap_or(0),
        tasks_running: counts.get(&TaskStatus::Running).copied().unwrap_or(0),
        tasks_completed: counts.get(&TaskStatus::Completed).copied().unwrap_or(0),
        tasks_failed: counts.get(&TaskStatus::Failed).copied().unwrap_or(0),
        tasks_cancelled: counts.get(&TaskStatus::Cancelled).copied().unwrap_or(0),
        ..MetricsOutput::default()
    };
    metrics.tasks_total = metrics.tasks_queued
        + metrics.tasks_running
        + metrics.tasks_completed
        + metrics.tasks_failed
        + metrics.tasks_cancelled;

    let rosters = futures::future::try_join_all(
        swarms.iter().map(|s| ctx.swarm_service.list_agents(s.id)),
    )
    .await?;

    let mut workload_sum = 0.0;
    for agent in rosters.into_iter().flatten() {
        metrics.agents += 1;
        if agent.role == AgentRole::Queen {
            metrics.queens += 1;
        }
        workload_sum += agent.workload;
        metrics.agent_tasks_completed += agent.metrics.tasks_completed;
        metrics.agent_tasks_failed += agent.metrics.tasks_failed;
    }
    if metrics.agents > 0 {
        metrics.avg_workload = workload_sum / metrics.agents as f64;
    }

    output(&metrics, json);
    Ok(())
}
