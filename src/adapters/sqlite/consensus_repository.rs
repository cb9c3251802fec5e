//! SQLite implementation of the ConsensusRepository.
//!
//! The `votes` column holds the structured blob (`for`/`against`/`abstain`/
//! `details`) alongside the raw vote map so both the summary shape and the
//! exact per-voter record survive a restart. Legacy flat maps are accepted
//! on read.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::domain::errors::{HiveError, HiveResult};
use crate::domain::models::{
    ConsensusAlgorithm, ConsensusDecision, ConsensusResult, ProposalType, Vote, VotesBlob,
};
use crate::domain::ports::ConsensusRepository;

use super::swarm_repository::{parse_ts, parse_uuid};

#[derive(Clone)]
pub struct SqliteConsensusRepository {
    pool: SqlitePool,
}

impl SqliteConsensusRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// On-disk shape of the `votes` column.
#[derive(Serialize, Deserialize)]
struct VotesColumn {
    #[serde(flatten)]
    blob: VotesBlob,
    /// Full vote map; absent in legacy records.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    raw: BTreeMap<String, Vote>,
}

fn votes_column(decision: &ConsensusDecision) -> Result<String, serde_json::Error> {
    let column = VotesColumn {
        blob: VotesBlob::from_votes(&decision.votes, decision.winning_option.as_deref()),
        raw: decision.votes.clone(),
    };
    serde_json::to_string(&column)
}

#[async_trait]
impl ConsensusRepository for SqliteConsensusRepository {
    async fn create(&self, decision: &ConsensusDecision) -> HiveResult<()> {
        sqlx::query(
            "INSERT INTO consensus_decisions (id, swarm_id, topic, options, algorithm,
             proposal_type, required_ratio, eligible_voters, votes, result, winning_option,
             confidence, deadline, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(decision.id.to_string())
        .bind(decision.swarm_id.to_string())
        .bind(&decision.topic)
        .bind(serde_json::to_string(&decision.options)?)
        .bind(decision.algorithm.as_str())
        .bind(decision.proposal_type.as_str())
        .bind(decision.required_ratio)
        .bind(decision.eligible_voters as i64)
        .bind(votes_column(decision)?)
        .bind(decision.result.as_str())
        .bind(decision.winning_option.as_deref())
        .bind(decision.confidence)
        .bind(decision.deadline.map(|t| t.to_rfc3339()))
        .bind(decision.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> HiveResult<Option<ConsensusDecision>> {
        let row: Option<DecisionRow> =
            sqlx::query_as("SELECT * FROM consensus_decisions WHERE id = ?")
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn update(&self, decision: &ConsensusDecision) -> HiveResult<()> {
        let result = sqlx::query(
            "UPDATE consensus_decisions SET votes = ?, result = ?, winning_option = ?,
             confidence = ? WHERE id = ?",
        )
        .bind(votes_column(decision)?)
        .bind(decision.result.as_str())
        .bind(decision.winning_option.as_deref())
        .bind(decision.confidence)
        .bind(decision.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(HiveError::DecisionNotFound(decision.id.to_string()));
        }
        Ok(())
    }

    async fn list_recent(
        &self,
        swarm_id: Option<Uuid>,
        limit: usize,
    ) -> HiveResult<Vec<ConsensusDecision>> {
        let rows: Vec<DecisionRow> = match swarm_id {
            Some(swarm_id) => {
                sqlx::query_as(
                    "SELECT * FROM consensus_decisions WHERE swarm_id = ?
                     ORDER BY created_at DESC LIMIT ?",
                )
                .bind(swarm_id.to_string())
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(
                    "SELECT * FROM consensus_decisions ORDER BY created_at DESC LIMIT ?",
                )
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn count(&self, swarm_id: Option<Uuid>) -> HiveResult<u64> {
        let (count,): (i64,) = match swarm_id {
            Some(swarm_id) => {
                sqlx::query_as("SELECT COUNT(*) FROM consensus_decisions WHERE swarm_id = ?")
                    .bind(swarm_id.to_string())
                    .fetch_one(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_as("SELECT COUNT(*) FROM consensus_decisions")
                    .fetch_one(&self.pool)
                    .await?
            }
        };
        Ok(count as u64)
    }
}

#[derive(sqlx::FromRow)]
struct DecisionRow {
    id: String,
    swarm_id: String,
    topic: String,
    options: String,
    algorithm: String,
    proposal_type: String,
    required_ratio: f64,
    eligible_voters: i64,
    votes: String,
    result: String,
    winning_option: Option<String>,
    confidence: f64,
    deadline: Option<String>,
    created_at: String,
}

impl TryFrom<DecisionRow> for ConsensusDecision {
    type Error = HiveError;

    fn try_from(row: DecisionRow) -> Result<Self, Self::Error> {
        // Prefer the full vote map; fall back to reconstructing one voter
        // per detail line from the (possibly legacy) summary blob.
        let votes: BTreeMap<String, Vote> =
            match serde_json::from_str::<VotesColumn>(&row.votes) {
                Ok(column) if !column.raw.is_empty() => column.raw,
                _ => {
                    let blob = VotesBlob::parse(&row.votes)
                        .map_err(|e| HiveError::Storage(format!("bad votes blob: {e}")))?;
                    blob.details
                        .into_iter()
                        .map(|d| {
                            let choice = match d.choice.as_str() {
                                "abstain" => crate::domain::models::VoteChoice::Abstain,
                                other => match other.strip_prefix("modify:") {
                                    Some(alt) => crate::domain::models::VoteChoice::Modify(
                                        alt.to_string(),
                                    ),
                                    None => crate::domain::models::VoteChoice::Option(
                                        other.to_string(),
                                    ),
                                },
                            };
                            let mut vote = Vote::new(choice);
                            vote.rationale = d.rationale;
                            (d.voter_id, vote)
                        })
                        .collect()
                }
            };

        Ok(ConsensusDecision {
            id: parse_uuid(&row.id)?,
            swarm_id: parse_uuid(&row.swarm_id)?,
            topic: row.topic,
            options: serde_json::from_str(&row.options)?,
            algorithm: ConsensusAlgorithm::from_str(&row.algorithm)
                .ok_or_else(|| HiveError::Storage(format!("bad algorithm: {}", row.algorithm)))?,
            proposal_type: ProposalType::from_str(&row.proposal_type).ok_or_else(|| {
                HiveError::Storage(format!("bad proposal type: {}", row.proposal_type))
            })?,
            required_ratio: row.required_ratio,
            eligible_voters: row.eligible_voters.max(0) as u64,
            votes,
            result: ConsensusResult::from_str(&row.result)
                .ok_or_else(|| HiveError::Storage(format!("bad result: {}", row.result)))?,
            winning_option: row.winning_option,
            confidence: row.confidence,
            deadline: row.deadline.as_deref().map(parse_ts).transpose()?,
            created_at: parse_ts(&row.created_at)?,
        })
    }
}
