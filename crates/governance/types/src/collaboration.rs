//! Collaborations, ballot boxes, votes and decisions
//!
//! Cross references are ids into the owning tables kept by the engine,
//! never owning pointers.

use crate::{CollaborationId, DecisionId, IndividualId, PolicyId, Scope, ScopeStatus, VoteId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Lifecycle of one policy instance
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "decision", rename_all = "snake_case")]
pub enum InstanceState {
    /// Receiving votes (single policies) or aggregating phases (composed)
    Open,
    /// Final; the decision is immutable
    Decided(DecisionId),
    /// An ancestor decided first; no longer evaluated
    Superseded,
}

/// Votes recorded against one opened policy instance
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BallotBox {
    pub policy: PolicyId,
    pub state: InstanceState,
    /// Live votes, in first-cast order
    pub votes: Vec<VoteId>,
    pub opened_at: DateTime<Utc>,
    pub deadline: Option<DateTime<Utc>>,
    /// Set once the deadline fired without producing a decision
    pub deadline_elapsed: bool,
}

impl BallotBox {
    pub fn open(policy: PolicyId, opened_at: DateTime<Utc>) -> Self {
        Self {
            policy,
            state: InstanceState::Open,
            votes: Vec::new(),
            opened_at,
            deadline: None,
            deadline_elapsed: false,
        }
    }

    pub fn with_deadline(mut self, deadline: Option<DateTime<Utc>>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn is_open(&self) -> bool {
        self.state == InstanceState::Open
    }

    pub fn decision(&self) -> Option<&DecisionId> {
        match &self.state {
            InstanceState::Decided(id) => Some(id),
            _ => None,
        }
    }
}

/// One individual's vote on one policy instance
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Vote {
    pub id: VoteId,
    pub collaboration: CollaborationId,
    pub policy: PolicyId,
    pub voter: IndividualId,
    pub agreement: bool,
    pub rationale: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Weight computed at cast time
    pub value: f64,
    /// Decision that consumed this vote
    pub part_of: Option<DecisionId>,
    /// Vote in the preceding phase this one was carried over from
    pub carried_from: Option<VoteId>,
}

impl Vote {
    pub fn new(
        collaboration: CollaborationId,
        policy: PolicyId,
        voter: IndividualId,
        agreement: bool,
        value: f64,
    ) -> Self {
        Self {
            id: VoteId::generate(),
            collaboration,
            policy,
            voter,
            agreement,
            rationale: None,
            timestamp: Utc::now(),
            value,
            part_of: None,
            carried_from: None,
        }
    }

    pub fn with_rationale(mut self, rationale: Option<String>) -> Self {
        self.rationale = rationale;
        self
    }

    pub fn carried_from(mut self, source: VoteId) -> Self {
        self.carried_from = Some(source);
        self
    }
}

/// Immutable outcome of evaluating one policy instance
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Decision {
    pub id: DecisionId,
    pub collaboration: CollaborationId,
    pub policy: PolicyId,
    pub accepted: bool,
    pub timestamp: DateTime<Utc>,
    /// Snapshot of the votes the outcome was computed from
    pub votes: Vec<VoteId>,
}

impl Decision {
    pub fn new(
        collaboration: CollaborationId,
        policy: PolicyId,
        accepted: bool,
        votes: Vec<VoteId>,
    ) -> Self {
        Self {
            id: DecisionId::generate(),
            collaboration,
            policy,
            accepted,
            timestamp: Utc::now(),
            votes,
        }
    }
}

/// One proposed unit of work under governance
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Collaboration {
    pub id: CollaborationId,
    pub scope: Scope,
    pub rationale: Option<String>,
    pub proposed_by: IndividualId,
    pub leader: IndividualId,
    pub status: ScopeStatus,
    /// Root policy selected by scope matching; `None` when ungoverned
    pub governing_policy: Option<PolicyId>,
    /// Opened policy instances, single and composed
    pub ballot_boxes: BTreeMap<PolicyId, BallotBox>,
    /// Instances whose PRE conditions failed; never opened
    pub skipped: BTreeSet<PolicyId>,
    /// Decision of the governing policy, once reached
    pub decision: Option<DecisionId>,
    pub created_at: DateTime<Utc>,
}

impl Collaboration {
    pub fn new(
        id: CollaborationId,
        scope: Scope,
        proposed_by: IndividualId,
        rationale: Option<String>,
    ) -> Self {
        Self {
            id,
            scope,
            rationale,
            leader: proposed_by.clone(),
            proposed_by,
            status: ScopeStatus::default(),
            governing_policy: None,
            ballot_boxes: BTreeMap::new(),
            skipped: BTreeSet::new(),
            decision: None,
            created_at: Utc::now(),
        }
    }

    /// Change the leader used by leader-driven policies
    pub fn reassign_leader(&mut self, leader: IndividualId) {
        self.leader = leader;
    }

    pub fn is_decided(&self) -> bool {
        self.decision.is_some()
    }

    pub fn ballot_box(&self, policy: &PolicyId) -> Option<&BallotBox> {
        self.ballot_boxes.get(policy)
    }

    pub fn is_open(&self, policy: &PolicyId) -> bool {
        self.ballot_boxes.get(policy).is_some_and(BallotBox::is_open)
    }

    pub fn open_instances(&self) -> impl Iterator<Item = &PolicyId> {
        self.ballot_boxes
            .values()
            .filter(|b| b.is_open())
            .map(|b| &b.policy)
    }
}
