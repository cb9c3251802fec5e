//! Consensus service: proposal and voting over persisted decisions.
//!
//! Every vote recomputes the tally; a decision that leaves `pending` is
//! written back in one atomic update carrying the full vote map and the
//! final confidence. Voting on a resolved decision is a no-op that returns
//! the existing result.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::errors::{HiveError, HiveResult};
use crate::domain::models::{
    ConsensusAlgorithm, ConsensusDecision, ConsensusResult, ProposalType, Vote, VoteChoice,
};
use crate::domain::models::{MemoryEntryType, MemoryValue};
use crate::domain::ports::ConsensusRepository;
use crate::services::event_bus::{EventBus, SwarmEvent};
use crate::services::shared_memory::{SharedMemory, StoreOptions};

/// Options for `vote`.
#[derive(Debug, Clone, Default)]
pub struct VoteOptions {
    pub weight: Option<f64>,
    pub rationale: Option<String>,
}

/// Outcome handed back to the voter.
#[derive(Debug, Clone)]
pub struct VoteOutcome {
    pub result: ConsensusResult,
    pub winning_option: Option<String>,
    pub confidence: f64,
    /// False when the decision was already terminal and the vote ignored.
    pub recorded: bool,
}

pub struct ConsensusService {
    decisions: Arc<dyn ConsensusRepository>,
    events: EventBus,
    collective_memory: Option<Arc<SharedMemory>>,
}

impl ConsensusService {
    pub fn new(decisions: Arc<dyn ConsensusRepository>, events: EventBus) -> Self {
        Self {
            decisions,
            events,
            collective_memory: None,
        }
    }

    /// Record resolved decisions into the swarm's collective memory.
    pub fn with_collective_memory(mut self, memory: Arc<SharedMemory>) -> Self {
        self.collective_memory = Some(memory);
        self
    }

    async fn remember_resolution(&self, decision: &ConsensusDecision) {
        let Some(memory) = &self.collective_memory else {
            return;
        };
        let payload = serde_json::json!({
            "topic": decision.topic,
            "result": decision.result.as_str(),
            "winning_option": decision.winning_option,
            "confidence": decision.confidence,
            "algorithm": decision.algorithm.as_str(),
        });
        let stored = memory
            .store(
                &format!("decision:{}", decision.id),
                MemoryValue::from(payload),
                StoreOptions::default()
                    .namespace(format!("swarm:{}", decision.swarm_id))
                    .entry_type(MemoryEntryType::Decision)
                    .created_by("consensus"),
            )
            .await;
        if let Err(err) = stored {
            // Collective memory is advisory; the decision row is the
            // source of truth.
            tracing::warn!(error = %err, "failed to record decision in collective memory");
        }
    }

    /// Create a pending decision. The required ratio follows the proposal
    /// type (0.8 strategic, 0.6 otherwise) overridden by the algorithm.
    #[instrument(skip(self, options), fields(topic = %topic))]
    pub async fn propose(
        &self,
        swarm_id: Uuid,
        proposal_type: ProposalType,
        topic: &str,
        options: Vec<String>,
        algorithm: ConsensusAlgorithm,
        eligible_voters: u64,
        deadline: Option<DateTime<Utc>>,
    ) -> HiveResult<ConsensusDecision> {
        let mut decision = ConsensusDecision::new(
            swarm_id,
            proposal_type,
            topic,
            options,
            algorithm,
            eligible_voters,
        )
        .map_err(HiveError::ValidationFailed)?;
        if let Some(deadline) = deadline {
            decision = decision.with_deadline(deadline);
        }

        self.decisions.create(&decision).await?;
        self.events.publish_swarm(SwarmEvent::ConsensusProposed {
            decision_id: decision.id,
            topic: decision.topic.clone(),
        });
        Ok(decision)
    }

    /// Record one vote and re-evaluate the decision.
    ///
    /// Duplicate voters are rejected. A vote on an already-terminal
    /// decision records nothing and returns the standing result.
    #[instrument(skip(self, options))]
    pub async fn vote(
        &self,
        decision_id: Uuid,
        voter_id: &str,
        choice: VoteChoice,
        options: VoteOptions,
    ) -> HiveResult<VoteOutcome> {
        let mut decision = self
            .decisions
            .get(decision_id)
            .await?
            .ok_or_else(|| HiveError::DecisionNotFound(decision_id.to_string()))?;

        if decision.result.is_terminal() {
            return Ok(VoteOutcome {
                result: decision.result,
                winning_option: decision.winning_option,
                confidence: decision.confidence,
                recorded: false,
            });
        }

        if decision.votes.contains_key(voter_id) {
            return Err(HiveError::DuplicateVote {
                decision_id: decision_id.to_string(),
                voter_id: voter_id.to_string(),
            });
        }

        let mut vote = Vote::new(choice);
        if let Some(weight) = options.weight {
            vote = vote.with_weight(weight);
        }
        if let Some(rationale) = options.rationale {
            vote = vote.with_rationale(rationale);
        }
        decision
            .record_vote(voter_id, vote)
            .map_err(HiveError::ValidationFailed)?;

        let outcome = decision.tally(Utc::now());
        let resolved_now = outcome.result.is_terminal();
        if resolved_now {
            decision.resolve(&outcome);
            self.events.publish_swarm(SwarmEvent::ConsensusResolved {
                decision_id,
                result: decision.result.as_str().to_string(),
                confidence: decision.confidence,
            });
            info!(
                %decision_id,
                result = decision.result.as_str(),
                confidence = decision.confidence,
                "consensus resolved"
            );
        }
        // One write carries the vote map and any result transition.
        self.decisions.update(&decision).await?;
        if resolved_now {
            self.remember_resolution(&decision).await;
        }

        Ok(VoteOutcome {
            result: decision.result,
            winning_option: decision.winning_option.clone(),
            confidence: decision.confidence,
            recorded: true,
        })
    }

    /// Re-evaluate a pending decision against its deadline.
    pub async fn expire_if_due(&self, decision_id: Uuid) -> HiveResult<ConsensusResult> {
        let mut decision = self
            .decisions
            .get(decision_id)
            .await?
            .ok_or_else(|| HiveError::DecisionNotFound(decision_id.to_string()))?;
        if decision.result.is_terminal() {
            return Ok(decision.result);
        }
        let outcome = decision.tally(Utc::now());
        if outcome.result.is_terminal() {
            decision.resolve(&outcome);
            self.decisions.update(&decision).await?;
            self.events.publish_swarm(SwarmEvent::ConsensusResolved {
                decision_id,
                result: decision.result.as_str().to_string(),
                confidence: decision.confidence,
            });
        }
        Ok(decision.result)
    }

    pub async fn get(&self, decision_id: Uuid) -> HiveResult<ConsensusDecision> {
        self.decisions
            .get(decision_id)
            .await?
            .ok_or_else(|| HiveError::DecisionNotFound(decision_id.to_string()))
    }

    pub async fn list_recent(
        &self,
        swarm_id: Option<Uuid>,
        limit: usize,
    ) -> HiveResult<Vec<ConsensusDecision>> {
        self.decisions.list_recent(swarm_id, limit).await
    }

    pub async fn count(&self, swarm_id: Option<Uuid>) -> HiveResult<u64> {
        self.decisions.count(swarm_id).await
    }
}
