//! Consensus domain model.
//!
//! A consensus decision is a persisted proposal with a vote map and a
//! terminal result. Tallying rules vary by algorithm; once a decision
//! leaves `pending` its result never changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// Voting algorithm for a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusAlgorithm {
    /// Half-plus-one of the eligible voters.
    Majority,
    /// Votes carry caller-supplied weights.
    Weighted,
    /// Two thirds of the eligible voters.
    Quorum,
    /// Every eligible voter must agree.
    Unanimous,
}

impl Default for ConsensusAlgorithm {
    fn default() -> Self {
        Self::Majority
    }
}

impl ConsensusAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Majority => "majority",
            Self::Weighted => "weighted",
            Self::Quorum => "quorum",
            Self::Unanimous => "unanimous",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "majority" => Some(Self::Majority),
            "weighted" => Some(Self::Weighted),
            "quorum" => Some(Self::Quorum),
            "unanimous" => Some(Self::Unanimous),
            _ => None,
        }
    }
}

/// Scope of a proposal; strategic proposals need a higher bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalType {
    Strategic,
    Tactical,
    Operational,
}

impl Default for ProposalType {
    fn default() -> Self {
        Self::Tactical
    }
}

impl ProposalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strategic => "strategic",
            Self::Tactical => "tactical",
            Self::Operational => "operational",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "strategic" => Some(Self::Strategic),
            "tactical" => Some(Self::Tactical),
            "operational" => Some(Self::Operational),
            _ => None,
        }
    }

    /// Base approval ratio before the algorithm override.
    pub fn base_ratio(&self) -> f64 {
        match self {
            Self::Strategic => 0.8,
            Self::Tactical | Self::Operational => 0.6,
        }
    }
}

/// Final state of a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusResult {
    Pending,
    Approved,
    Rejected,
    Modified,
}

impl Default for ConsensusResult {
    fn default() -> Self {
        Self::Pending
    }
}

impl ConsensusResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Modified => "modified",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "modified" => Some(Self::Modified),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// What a voter chose.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum VoteChoice {
    /// One of the proposal's options, by exact text.
    Option(String),
    /// Explicit abstention; counts toward participation only.
    Abstain,
    /// Proposes alternate text instead of the listed options.
    Modify(String),
}

impl VoteChoice {
    /// Tally key this choice scores under, if any.
    fn score_key(&self) -> Option<String> {
        match self {
            Self::Option(opt) => Some(opt.clone()),
            Self::Modify(alt) => Some(format!("modify:{alt}")),
            Self::Abstain => None,
        }
    }
}

/// A single recorded vote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    pub choice: VoteChoice,
    pub weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    pub ts: DateTime<Utc>,
}

impl Vote {
    pub fn new(choice: VoteChoice) -> Self {
        Self {
            choice,
            weight: 1.0,
            rationale: None,
            ts: Utc::now(),
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = Some(rationale.into());
        self
    }
}

/// Outcome of a tally pass over the current votes.
#[derive(Debug, Clone, PartialEq)]
pub struct TallyOutcome {
    pub result: ConsensusResult,
    /// Winning option text (or modify alternate) when non-pending and not rejected.
    pub winning_option: Option<String>,
    /// Winning ratio; becomes the decision's confidence on transition.
    pub confidence: f64,
}

/// A persisted consensus decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusDecision {
    pub id: Uuid,
    pub swarm_id: Uuid,
    pub topic: String,
    /// Non-empty ordered option list.
    pub options: Vec<String>,
    pub algorithm: ConsensusAlgorithm,
    pub proposal_type: ProposalType,
    /// Required approval ratio in (0, 1].
    pub required_ratio: f64,
    /// Size of the voting population.
    pub eligible_voters: u64,
    /// Votes keyed by voter id; each voter appears at most once.
    pub votes: BTreeMap<String, Vote>,
    pub result: ConsensusResult,
    pub winning_option: Option<String>,
    pub confidence: f64,
    pub deadline: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ConsensusDecision {
    /// Create a pending decision; computes the required ratio from the
    /// proposal type and algorithm.
    pub fn new(
        swarm_id: Uuid,
        proposal_type: ProposalType,
        topic: impl Into<String>,
        options: Vec<String>,
        algorithm: ConsensusAlgorithm,
        eligible_voters: u64,
    ) -> Result<Self, String> {
        let topic = topic.into();
        if topic.trim().is_empty() {
            return Err("Consensus topic cannot be empty".to_string());
        }
        if options.is_empty() {
            return Err("Consensus options cannot be empty".to_string());
        }
        if eligible_voters == 0 {
            return Err("Consensus needs at least one eligible voter".to_string());
        }

        let required_ratio = match algorithm {
            ConsensusAlgorithm::Unanimous => 1.0,
            ConsensusAlgorithm::Quorum => 2.0 / 3.0,
            ConsensusAlgorithm::Majority => {
                (eligible_voters / 2 + 1) as f64 / eligible_voters as f64
            }
            ConsensusAlgorithm::Weighted => proposal_type.base_ratio(),
        };

        Ok(Self {
            id: Uuid::new_v4(),
            swarm_id,
            topic,
            options,
            algorithm,
            proposal_type,
            required_ratio,
            eligible_voters,
            votes: BTreeMap::new(),
            result: ConsensusResult::Pending,
            winning_option: None,
            confidence: 0.0,
            deadline: None,
            created_at: Utc::now(),
        })
    }

    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Record a vote. Fails on duplicate voter, unknown option, or a
    /// terminal decision (callers treat the terminal case as a no-op).
    pub fn record_vote(&mut self, voter_id: &str, vote: Vote) -> Result<(), String> {
        if self.result.is_terminal() {
            return Err("decision already resolved".to_string());
        }
        if self.votes.contains_key(voter_id) {
            return Err(format!("duplicate vote from {voter_id}"));
        }
        if let VoteChoice::Option(opt) = &vote.choice {
            if !self.options.contains(opt) {
                return Err(format!("unknown option: {opt}"));
            }
        }
        self.votes.insert(voter_id.to_string(), vote);
        Ok(())
    }

    /// Compute the tally over the current votes as of `now`.
    ///
    /// Count-based algorithms measure the winning score against the
    /// eligible population; `weighted` measures against total cast weight
    /// (the weights of voters yet to vote are unknowable). The decision
    /// resolves once the population has fully voted or the deadline has
    /// passed: approved (or modified) when the uniquely-highest option
    /// reached the required ratio, rejected otherwise. Until then every
    /// eligible voter's ballot is accepted and recorded.
    pub fn tally(&self, now: DateTime<Utc>) -> TallyOutcome {
        let mut scores: HashMap<String, f64> = HashMap::new();
        for vote in self.votes.values() {
            if let Some(key) = vote.choice.score_key() {
                let w = if self.algorithm == ConsensusAlgorithm::Weighted {
                    vote.weight
                } else {
                    1.0
                };
                *scores.entry(key).or_default() += w;
            }
        }

        let denominator = if self.algorithm == ConsensusAlgorithm::Weighted {
            self.votes
                .values()
                .map(|v| v.weight)
                .sum::<f64>()
                .max(f64::MIN_POSITIVE)
        } else {
            self.eligible_voters as f64
        };

        let mut best: Option<(&String, f64)> = None;
        let mut uniquely_highest = true;
        for (key, score) in &scores {
            match best {
                None => best = Some((key, *score)),
                Some((_, top)) if *score > top => {
                    best = Some((key, *score));
                    uniquely_highest = true;
                }
                Some((_, top)) if (*score - top).abs() < f64::EPSILON => {
                    uniquely_highest = false;
                }
                _ => {}
            }
        }

        let (winner, ratio) = match best {
            Some((key, score)) => (Some(key.clone()), score / denominator),
            None => (None, 0.0),
        };

        let everyone_voted = self.votes.len() as u64 >= self.eligible_voters;
        let deadline_passed = matches!(self.deadline, Some(d) if now >= d);
        if !everyone_voted && !deadline_passed {
            return TallyOutcome {
                result: ConsensusResult::Pending,
                winning_option: winner,
                confidence: ratio,
            };
        }

        let approved = uniquely_highest && winner.is_some() && ratio >= self.required_ratio - 1e-9;
        if approved {
            let winner = winner.unwrap_or_default();
            if let Some(alternate) = winner.strip_prefix("modify:") {
                return TallyOutcome {
                    result: ConsensusResult::Modified,
                    winning_option: Some(alternate.to_string()),
                    confidence: ratio,
                };
            }
            return TallyOutcome {
                result: ConsensusResult::Approved,
                winning_option: Some(winner),
                confidence: ratio,
            };
        }

        TallyOutcome {
            result: ConsensusResult::Rejected,
            winning_option: None,
            confidence: ratio,
        }
    }

    /// Apply a non-pending tally outcome; terminal results are monotonic.
    pub fn resolve(&mut self, outcome: &TallyOutcome) {
        if self.result.is_terminal() || !outcome.result.is_terminal() {
            return;
        }
        self.result = outcome.result;
        self.winning_option = outcome.winning_option.clone();
        self.confidence = outcome.confidence;
    }
}

/// Persisted shape of the `votes` blob.
///
/// `for` counts votes for the winning option, `against` every other cast
/// vote, `abstain` explicit abstentions. Legacy records used a flat
/// `voter → choice` map; the reader accepts both.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VotesBlob {
    #[serde(rename = "for")]
    pub for_votes: u64,
    pub against: u64,
    pub abstain: u64,
    pub details: Vec<VoteDetail>,
}

/// One voter's line in the persisted blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteDetail {
    pub voter_id: String,
    pub choice: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

impl VotesBlob {
    /// Build the blob from a decision's votes and its winning option.
    pub fn from_votes(votes: &BTreeMap<String, Vote>, winning_option: Option<&str>) -> Self {
        let mut blob = Self::default();
        for (voter_id, vote) in votes {
            let choice_text = match &vote.choice {
                VoteChoice::Option(opt) => opt.clone(),
                VoteChoice::Abstain => "abstain".to_string(),
                VoteChoice::Modify(alt) => format!("modify:{alt}"),
            };
            match &vote.choice {
                VoteChoice::Abstain => blob.abstain += 1,
                VoteChoice::Option(opt) if Some(opt.as_str()) == winning_option => {
                    blob.for_votes += 1;
                }
                VoteChoice::Modify(alt)
                    if Some(format!("modify:{alt}").as_str()) == winning_option
                        || Some(alt.as_str()) == winning_option =>
                {
                    blob.for_votes += 1;
                }
                _ => blob.against += 1,
            }
            blob.details.push(VoteDetail {
                voter_id: voter_id.clone(),
                choice: choice_text,
                rationale: vote.rationale.clone(),
            });
        }
        blob
    }

    /// Parse a persisted blob, accepting both the current structured shape
    /// and the legacy flat `voter → choice` map.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Compat {
            Current(VotesBlob),
            Legacy(BTreeMap<String, String>),
        }

        match serde_json::from_str::<Compat>(raw)? {
            Compat::Current(blob) => Ok(blob),
            Compat::Legacy(map) => {
                let details: Vec<VoteDetail> = map
                    .into_iter()
                    .map(|(voter_id, choice)| VoteDetail {
                        voter_id,
                        choice,
                        rationale: None,
                    })
                    .collect();
                let abstain = details.iter().filter(|d| d.choice == "abstain").count() as u64;
                Ok(Self {
                    for_votes: 0,
                    against: details.len() as u64 - abstain,
                    abstain,
                    details,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decision(algorithm: ConsensusAlgorithm, voters: u64) -> ConsensusDecision {
        ConsensusDecision::new(
            Uuid::new_v4(),
            ProposalType::Tactical,
            "REST or GraphQL?",
            vec!["REST".into(), "GraphQL".into(), "Both".into()],
            algorithm,
            voters,
        )
        .unwrap()
    }

    #[test]
    fn test_majority_required_ratio() {
        let d = decision(ConsensusAlgorithm::Majority, 5);
        assert!((d.required_ratio - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_majority_approval_scenario() {
        let mut d = decision(ConsensusAlgorithm::Majority, 5);
        for (voter, choice) in [
            ("a", "REST"),
            ("b", "REST"),
            ("c", "REST"),
            ("d", "GraphQL"),
            ("e", "Both"),
        ] {
            d.record_vote(voter, Vote::new(VoteChoice::Option(choice.into())))
                .unwrap();
        }
        let outcome = d.tally(Utc::now());
        assert_eq!(outcome.result, ConsensusResult::Approved);
        assert_eq!(outcome.winning_option.as_deref(), Some("REST"));
        assert!((outcome.confidence - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_duplicate_vote_rejected() {
        let mut d = decision(ConsensusAlgorithm::Majority, 3);
        d.record_vote("a", Vote::new(VoteChoice::Option("REST".into())))
            .unwrap();
        assert!(d
            .record_vote("a", Vote::new(VoteChoice::Option("Both".into())))
            .is_err());
    }

    #[test]
    fn test_unknown_option_rejected() {
        let mut d = decision(ConsensusAlgorithm::Majority, 3);
        assert!(d
            .record_vote("a", Vote::new(VoteChoice::Option("SOAP".into())))
            .is_err());
    }

    #[test]
    fn test_unanimous_requires_everyone() {
        let mut d = decision(ConsensusAlgorithm::Unanimous, 3);
        d.record_vote("a", Vote::new(VoteChoice::Option("REST".into())))
            .unwrap();
        d.record_vote("b", Vote::new(VoteChoice::Option("REST".into())))
            .unwrap();
        assert_eq!(d.tally(Utc::now()).result, ConsensusResult::Pending);
        d.record_vote("c", Vote::new(VoteChoice::Option("REST".into())))
            .unwrap();
        assert_eq!(d.tally(Utc::now()).result, ConsensusResult::Approved);
    }

    #[test]
    fn test_full_participation_without_ratio_rejects() {
        let mut d = decision(ConsensusAlgorithm::Unanimous, 2);
        d.record_vote("a", Vote::new(VoteChoice::Option("REST".into())))
            .unwrap();
        d.record_vote("b", Vote::new(VoteChoice::Option("GraphQL".into())))
            .unwrap();
        assert_eq!(d.tally(Utc::now()).result, ConsensusResult::Rejected);
    }

    #[test]
    fn test_deadline_rejects() {
        let mut d =
            decision(ConsensusAlgorithm::Majority, 5).with_deadline(Utc::now() - chrono::Duration::seconds(1));
        d.record_vote("a", Vote::new(VoteChoice::Option("REST".into())))
            .unwrap();
        assert_eq!(d.tally(Utc::now()).result, ConsensusResult::Rejected);
    }

    #[test]
    fn test_weighted_uses_cast_weight() {
        let mut d = ConsensusDecision::new(
            Uuid::new_v4(),
            ProposalType::Tactical,
            "topic",
            vec!["A".into(), "B".into()],
            ConsensusAlgorithm::Weighted,
            2,
        )
        .unwrap();
        d.record_vote("a", Vote::new(VoteChoice::Option("A".into())).with_weight(3.0))
            .unwrap();
        d.record_vote("b", Vote::new(VoteChoice::Option("B".into())).with_weight(1.0))
            .unwrap();
        let outcome = d.tally(Utc::now());
        // 3 / 4 = 0.75 >= 0.6 tactical base
        assert_eq!(outcome.result, ConsensusResult::Approved);
        assert!((outcome.confidence - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_modify_win_yields_modified() {
        let mut d = decision(ConsensusAlgorithm::Majority, 3);
        for voter in ["a", "b"] {
            d.record_vote(voter, Vote::new(VoteChoice::Modify("gRPC instead".into())))
                .unwrap();
        }
        d.record_vote("c", Vote::new(VoteChoice::Abstain)).unwrap();
        let outcome = d.tally(Utc::now());
        assert_eq!(outcome.result, ConsensusResult::Modified);
        assert_eq!(outcome.winning_option.as_deref(), Some("gRPC instead"));
    }

    #[test]
    fn test_deadline_with_ratio_met_approves() {
        let mut d = decision(ConsensusAlgorithm::Majority, 5)
            .with_deadline(Utc::now() - chrono::Duration::seconds(1));
        for voter in ["a", "b", "c"] {
            d.record_vote(voter, Vote::new(VoteChoice::Option("REST".into())))
                .unwrap();
        }
        let outcome = d.tally(Utc::now());
        assert_eq!(outcome.result, ConsensusResult::Approved);
        assert!((outcome.confidence - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_partial_participation_stays_pending() {
        let mut d = decision(ConsensusAlgorithm::Majority, 5);
        for voter in ["a", "b", "c"] {
            d.record_vote(voter, Vote::new(VoteChoice::Option("REST".into())))
                .unwrap();
        }
        // The ratio is already sufficient, but two voters are still due.
        let outcome = d.tally(Utc::now());
        assert_eq!(outcome.result, ConsensusResult::Pending);
        assert_eq!(outcome.winning_option.as_deref(), Some("REST"));
    }

    #[test]
    fn test_resolve_is_monotonic() {
        let mut d = decision(ConsensusAlgorithm::Majority, 3);
        for voter in ["a", "b", "c"] {
            d.record_vote(voter, Vote::new(VoteChoice::Option("REST".into())))
                .unwrap();
        }
        let outcome = d.tally(Utc::now());
        d.resolve(&outcome);
        assert_eq!(d.result, ConsensusResult::Approved);

        let rejected = TallyOutcome {
            result: ConsensusResult::Rejected,
            winning_option: None,
            confidence: 0.0,
        };
        d.resolve(&rejected);
        assert_eq!(d.result, ConsensusResult::Approved);
    }

    #[test]
    fn test_votes_blob_scenario_counts() {
        let mut d = decision(ConsensusAlgorithm::Majority, 5);
        for (voter, choice) in [
            ("a", "REST"),
            ("b", "REST"),
            ("c", "REST"),
            ("d", "GraphQL"),
            ("e", "Both"),
        ] {
            d.record_vote(voter, Vote::new(VoteChoice::Option(choice.into())))
                .unwrap();
        }
        let blob = VotesBlob::from_votes(&d.votes, Some("REST"));
        assert_eq!(blob.for_votes, 3);
        assert_eq!(blob.against, 2);
        assert_eq!(blob.abstain, 0);
        assert_eq!(blob.details.len(), 5);
    }

    #[test]
    fn test_votes_blob_accepts_legacy_shape() {
        let legacy = r#"{"agent-1": "REST", "agent-2": "abstain"}"#;
        let blob = VotesBlob::parse(legacy).unwrap();
        assert_eq!(blob.details.len(), 2);
        assert_eq!(blob.abstain, 1);

        let current = serde_json::to_string(&VotesBlob::default()).unwrap();
        assert!(VotesBlob::parse(&current).is_ok());
    }
}
