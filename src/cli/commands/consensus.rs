//! `consensus` command: list recent decisions or run one to a result.

use anyhow::{bail, Result};
use comfy_table::{presets::UTF8_FULL_CONDENSED, Table};
use serde::Serialize;

use crate::cli::output::{output, truncate, CommandOutput};
use crate::cli::HiveContext;
use crate::domain::models::{
    ConsensusAlgorithm, ProposalType, QueenType, SwarmStatus, VoteChoice,
};
use crate::services::{InitSwarmOptions, VoteOptions};

#[derive(Debug, Serialize)]
struct DecisionLine {
    id: String,
    topic: String,
    algorithm: String,
    result: String,
    winning_option: Option<String>,
    confidence: f64,
    votes: usize,
}

#[derive(Debug, Serialize)]
struct ConsensusListOutput {
    decisions: Vec<DecisionLine>,
}

impl CommandOutput for ConsensusListOutput {
    fn to_human(&self) -> String {
        if self.decisions.is_empty() {
            return "No consensus decisions recorded.".to_string();
        }
        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED).set_header(vec![
            "ID", "Topic", "Algorithm", "Result", "Winner", "Confidence", "Votes",
        ]);
        for d in &self.decisions {
            table.add_row(vec![
                truncate(&d.id, 8),
                truncate(&d.topic, 32),
                d.algorithm.clone(),
                d.result.clone(),
                d.winning_option.clone().unwrap_or_else(|| "-".to_string()),
                format!("{:.2}", d.confidence),
                d.votes.to_string(),
            ]);
        }
        table.to_string()
    }
}

#[derive(Debug, Serialize)]
struct DecideOutput {
    decision_id: String,
    topic: String,
    algorithm: String,
    eligible_voters: u64,
    result: String,
    winning_option: Option<String>,
    confidence: f64,
}

impl CommandOutput for DecideOutput {
    fn to_human(&self) -> String {
        format!(
            "Decision {} on \"{}\" ({} of {} voters): {}{}  confidence {:.2}",
            truncate(&self.decision_id, 8),
            self.topic,
            self.algorithm,
            self.eligible_voters,
            self.result,
            self.winning_option
                .as_ref()
                .map(|w| format!(" → {w}"))
                .unwrap_or_default(),
            self.confidence,
        )
    }
}

#[allow(clippy::too_many_arguments)]
pub async fn handle_consensus(
    ctx: &HiveContext,
    decide: Option<String>,
    options: Vec<String>,
    algorithm: &str,
    proposal_type: &str,
    queen_type: &str,
    agents: Option<u64>,
    limit: usize,
    json: bool,
) -> Result<()> {
    match decide {
        None => handle_list(ctx, limit, json).await,
        Some(topic) => {
            handle_decide(
                ctx,
                &topic,
                options,
                algorithm,
                proposal_type,
                queen_type,
                agents,
                json,
            )
            .await
        }
    }
}

async fn handle_list(ctx: &HiveContext, limit: usize, json: bool) -> Result<()> {
    let decisions = ctx.consensus.list_recent(None, limit).await?;
    output(
        &ConsensusListOutput {
            decisions: decisions
                .into_iter()
                .map(|d| DecisionLine {
                    id: d.id.to_string(),
                    topic: d.topic,
                    algorithm: d.algorithm.as_str().to_string(),
                    result: d.result.as_str().to_string(),
                    winning_option: d.winning_option,
                    confidence: d.confidence,
                    votes: d.votes.len(),
                })
                .collect(),
        },
        json,
    );
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn handle_decide(
    ctx: &HiveContext,
    topic: &str,
    options: Vec<String>,
    algorithm: &str,
    proposal_type: &str,
    queen_type: &str,
    agents: Option<u64>,
    json: bool,
) -> Result<()> {
    if options.is_empty() {
        bail!("--decide needs --options a,b,c");
    }
    let algorithm = ConsensusAlgorithm::from_str(algorithm)
        .ok_or_else(|| anyhow::anyhow!("Invalid consensus algorithm: {algorithm}"))?;
    let proposal_type = ProposalType::from_str(proposal_type)
        .ok_or_else(|| anyhow::anyhow!("Invalid proposal type: {proposal_type}"))?;
    let queen_type = QueenType::from_str(queen_type)
        .ok_or_else(|| anyhow::anyhow!("Invalid queen type: {queen_type}"))?;

    // Use the most recent active swarm, or spin up an ad-hoc one so the
    // decision has a home and a voting population.
    let swarm = match ctx
        .swarm_service
        .list_swarms(Some(SwarmStatus::Active))
        .await?
        .into_iter()
        .next()
    {
        Some(swarm) => swarm,
        None => {
            let (swarm, _) = ctx
                .swarm_service
                .init_swarm(InitSwarmOptions {
                    name: "consensus".to_string(),
                    objective: topic.to_string(),
                    queen_type,
                    max_workers: ctx.config.max_agents,
                    consensus_algorithm: algorithm,
                    auto_scale: false,
                    encryption: false,
                })
                .await?;
            swarm
        }
    };

    let eligible = match agents {
        Some(n) => n,
        None => {
            let count = ctx.swarm_service.list_agents(swarm.id).await?.len() as u64;
            count.max(1)
        }
    };

    let decision = ctx
        .consensus
        .propose(
            swarm.id,
            proposal_type,
            topic,
            options.clone(),
            algorithm,
            eligible,
            None,
        )
        .await?;

    // Simulated agent voting: a deterministic split that favors the first
    // option, spreading the remainder round-robin over the rest.
    let favored = (eligible as usize * 7).div_ceil(10);
    for voter in 0..eligible as usize {
        let choice = if voter < favored || options.len() == 1 {
            options[0].clone()
        } else {
            options[1 + (voter - favored) % (options.len() - 1)].clone()
        };
        let result = ctx
            .consensus
            .vote(
                decision.id,
                &format!("agent-{}", voter + 1),
                VoteChoice::Option(choice),
                VoteOptions::default(),
            )
            .await?;
        if result.result.is_terminal() {
            break;
        }
    }

    let resolved = ctx.consensus.get(decision.id).await?;
    output(
        &DecideOutput {
            decision_id: resolved.id.to_string(),
            topic: resolved.topic,
            algorithm: resolved.algorithm.as_str().to_string(),
            eligible_voters: resolved.eligible_voters,
            result: resolved.result.as_str().to_string(),
            winning_option: resolved.winning_option,
            confidence: resolved.confidence,
        },
        json,
    );
    Ok(())
}
