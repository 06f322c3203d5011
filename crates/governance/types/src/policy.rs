//! Policy model
//!
//! A policy is either a single policy of one of the voting kinds, holding
//! votes directly, or a composed policy sequencing or parallelizing its
//! phases. Policies are immutable once loaded into a [`PolicyForest`].
//!
//! [`PolicyForest`]: crate::PolicyForest

use crate::{Participant, PolicyId, Scope};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Acceptance threshold used when a policy declares none
pub const DEFAULT_RATIO: f64 = 0.5;

/// When a condition is checked relative to evaluation
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationMode {
    /// Before a policy opens; failing skips the policy
    Pre,
    /// On every decision and decidability check
    #[default]
    Concurrent,
    /// After an affirmative decision
    Post,
}

fn default_inclusion() -> bool {
    true
}

/// Built-in condition kinds
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConditionKind {
    /// Holds iff the ballot box has at least `min` votes
    MinimumParticipants { min: usize },
    /// Fails iff any vetoer cast a negative vote
    VetoRight { vetoers: Vec<Participant> },
    /// Strips votes cast by the excluded participants; always holds
    ParticipantExclusion { excluded: Vec<Participant> },
    /// Platform status checks on the element must pass
    CheckStatus,
    /// As PRE/CONCURRENT: the element carries (or lacks) every label.
    /// As POST: the labels are applied to the element.
    Labels {
        labels: BTreeSet<String>,
        #[serde(default = "default_inclusion")]
        inclusion: bool,
    },
}

/// A condition tagged with its evaluation mode
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(default)]
    pub mode: EvaluationMode,
    #[serde(flatten)]
    pub kind: ConditionKind,
}

impl Condition {
    pub fn new(kind: ConditionKind) -> Self {
        Self {
            mode: EvaluationMode::default(),
            kind,
        }
    }

    pub fn minimum_participants(min: usize) -> Self {
        Self::new(ConditionKind::MinimumParticipants { min })
    }

    pub fn veto_right(vetoers: Vec<Participant>) -> Self {
        Self::new(ConditionKind::VetoRight { vetoers })
    }

    pub fn participant_exclusion(excluded: Vec<Participant>) -> Self {
        Self::new(ConditionKind::ParticipantExclusion { excluded })
    }

    pub fn check_status() -> Self {
        Self::new(ConditionKind::CheckStatus)
    }

    pub fn labels<I, S>(labels: I, inclusion: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(ConditionKind::Labels {
            labels: labels.into_iter().map(Into::into).collect(),
            inclusion,
        })
    }

    pub fn with_mode(mut self, mode: EvaluationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Whether answering this condition needs the platform
    pub fn is_external(&self) -> bool {
        matches!(
            self.kind,
            ConditionKind::CheckStatus | ConditionKind::Labels { .. }
        )
    }
}

/// Deadline of a single policy
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Deadline {
    At { at: DateTime<Utc> },
    /// Seconds after the policy instance opens
    Offset { seconds: i64 },
}

impl Deadline {
    pub fn due_at(&self, opened_at: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Deadline::At { at } => *at,
            Deadline::Offset { seconds } => opened_at + Duration::seconds(*seconds),
        }
    }
}

/// Participants, conditions, ratio and deadline of a single policy
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VotingRules {
    #[serde(default)]
    pub participants: Vec<Participant>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ratio: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<Deadline>,
}

impl VotingRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_participant(mut self, participant: Participant) -> Self {
        self.participants.push(participant);
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_ratio(mut self, ratio: f64) -> Self {
        self.ratio = Some(ratio);
        self
    }

    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn effective_ratio(&self) -> f64 {
        self.ratio.unwrap_or(DEFAULT_RATIO)
    }

    pub fn conditions_in(&self, mode: EvaluationMode) -> impl Iterator<Item = &Condition> {
        self.conditions.iter().filter(move |c| c.mode == mode)
    }
}

/// Phases of a composed policy and how they combine
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Composition {
    pub phases: Vec<PolicyId>,
    #[serde(default)]
    pub sequential: bool,
    #[serde(default)]
    pub require_all: bool,
    #[serde(default)]
    pub carry_over: bool,
}

impl Composition {
    pub fn sequential(phases: Vec<PolicyId>) -> Self {
        Self {
            phases,
            sequential: true,
            require_all: true,
            carry_over: false,
        }
    }

    pub fn parallel(phases: Vec<PolicyId>) -> Self {
        Self {
            phases,
            sequential: false,
            require_all: true,
            carry_over: false,
        }
    }

    pub fn with_require_all(mut self, require_all: bool) -> Self {
        self.require_all = require_all;
        self
    }

    pub fn with_carry_over(mut self, carry_over: bool) -> Self {
        self.carry_over = carry_over;
        self
    }

    pub fn phase_index(&self, phase: &PolicyId) -> Option<usize> {
        self.phases.iter().position(|p| p == phase)
    }
}

/// Closed set of policy kinds
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyKind {
    Majority(VotingRules),
    AbsoluteMajority(VotingRules),
    Consensus(VotingRules),
    LazyConsensus(VotingRules),
    Voting(VotingRules),
    LeaderDriven {
        #[serde(flatten)]
        rules: VotingRules,
        /// Policy opened when the leader has not voted
        default: PolicyId,
    },
    Composed(Composition),
}

impl PolicyKind {
    pub fn name(&self) -> &'static str {
        match self {
            PolicyKind::Majority(_) => "majority",
            PolicyKind::AbsoluteMajority(_) => "absolute_majority",
            PolicyKind::Consensus(_) => "consensus",
            PolicyKind::LazyConsensus(_) => "lazy_consensus",
            PolicyKind::Voting(_) => "voting",
            PolicyKind::LeaderDriven { .. } => "leader_driven",
            PolicyKind::Composed(_) => "composed",
        }
    }
}

/// A policy bound to the scope it governs
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub id: PolicyId,
    pub scope: Scope,
    /// Enclosing composed or leader-driven policy; computed at forest load
    #[serde(default, skip_serializing)]
    pub parent: Option<PolicyId>,
    #[serde(flatten)]
    pub kind: PolicyKind,
}

impl Policy {
    pub fn new(id: impl Into<String>, scope: impl Into<Scope>, kind: PolicyKind) -> Self {
        Self {
            id: PolicyId::new(id),
            scope: scope.into(),
            parent: None,
            kind,
        }
    }

    pub fn majority(id: impl Into<String>, scope: impl Into<Scope>, rules: VotingRules) -> Self {
        Self::new(id, scope, PolicyKind::Majority(rules))
    }

    pub fn composed(
        id: impl Into<String>,
        scope: impl Into<Scope>,
        composition: Composition,
    ) -> Self {
        Self::new(id, scope, PolicyKind::Composed(composition))
    }

    /// Voting rules of a single policy; `None` for composed policies
    pub fn rules(&self) -> Option<&VotingRules> {
        match &self.kind {
            PolicyKind::Majority(r)
            | PolicyKind::AbsoluteMajority(r)
            | PolicyKind::Consensus(r)
            | PolicyKind::LazyConsensus(r)
            | PolicyKind::Voting(r) => Some(r),
            PolicyKind::LeaderDriven { rules, .. } => Some(rules),
            PolicyKind::Composed(_) => None,
        }
    }

    pub fn composition(&self) -> Option<&Composition> {
        match &self.kind {
            PolicyKind::Composed(c) => Some(c),
            _ => None,
        }
    }

    pub fn is_composed(&self) -> bool {
        matches!(self.kind, PolicyKind::Composed(_))
    }

    /// Policies structurally owned by this one: phases, or the leader's default
    pub fn children(&self) -> Vec<&PolicyId> {
        match &self.kind {
            PolicyKind::Composed(c) => c.phases.iter().collect(),
            PolicyKind::LeaderDriven { default, .. } => vec![default],
            _ => Vec::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}
