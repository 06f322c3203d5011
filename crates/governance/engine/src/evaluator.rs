//! Policy evaluator: ternary decisions and early decidability
//!
//! Ratio-based kinds share one shape. `in_favour` and `total` are sums of
//! vote values; an empty ballot is never decidable. Decidability asks
//! whether the outcome is already certain: with a deadline, the
//! abstainers' largest possible swing is added to the denominator so no
//! later vote can flip the result; without a deadline, the cast votes
//! alone decide (absolute majority always pads, and lazy consensus does
//! not count silence as consent early).

use crate::ballot::Tally;
use crate::conditions::{self, ConditionState};
use crate::facts::ConditionOracle;
use governance_types::{
    EvaluationMode, IndividualId, PolicyForest, PolicyId, PolicyKind, Vote, VotingRules,
};
use std::collections::BTreeMap;

/// Threshold rule of a ratio-based policy kind
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThresholdRule {
    /// Majority and Voting: `in_favour / total > ratio`
    Simple,
    /// Non-voters count as implicit "no"
    Absolute,
    /// Like `Simple`, also accepting unanimity
    Consensus,
    /// Non-voters count as implicit "yes", unanimity accepts
    Lazy,
}

impl ThresholdRule {
    pub fn for_kind(kind: &PolicyKind) -> Option<Self> {
        match kind {
            PolicyKind::Majority(_) | PolicyKind::Voting(_) => Some(ThresholdRule::Simple),
            PolicyKind::AbsoluteMajority(_) => Some(ThresholdRule::Absolute),
            PolicyKind::Consensus(_) => Some(ThresholdRule::Consensus),
            PolicyKind::LazyConsensus(_) => Some(ThresholdRule::Lazy),
            PolicyKind::LeaderDriven { .. } | PolicyKind::Composed(_) => None,
        }
    }

    fn accepts_unanimity(&self) -> bool {
        matches!(self, ThresholdRule::Consensus | ThresholdRule::Lazy)
    }

    /// Decide on the given tally; `None` for an empty ballot
    pub fn decide(&self, tally: &Tally, ratio: f64) -> Option<bool> {
        if tally.is_empty() {
            return None;
        }
        let unanimous = tally.against <= 0.0;
        let accepted = match self {
            ThresholdRule::Simple => tally.in_favour / tally.total() > ratio,
            ThresholdRule::Absolute => {
                tally.in_favour / (tally.total() + tally.abstention) > ratio
            }
            ThresholdRule::Consensus => tally.in_favour / tally.total() > ratio || unanimous,
            ThresholdRule::Lazy => {
                (tally.in_favour + tally.abstention) / (tally.total() + tally.abstention) > ratio
                    || unanimous
            }
        };
        Some(accepted)
    }

    /// Whether acceptance and rejection are already certain
    pub fn certainty(&self, tally: &Tally, ratio: f64, has_deadline: bool) -> Certainty {
        if tally.is_empty() {
            return Certainty::default();
        }
        let padded = tally.total() + tally.swing;
        let rejected = tally.against / padded > 1.0 - ratio;

        let unanimous = self.accepts_unanimity() && tally.against <= 0.0;
        let accepted = if has_deadline || *self == ThresholdRule::Absolute {
            tally.in_favour / padded > ratio || (unanimous && tally.swing <= 0.0)
        } else {
            // Cast votes only; silence is not consent until the ballot closes
            tally.in_favour / tally.total() > ratio || unanimous
        };

        Certainty { accepted, rejected }
    }
}

/// Which outcomes no further vote can change
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Certainty {
    pub accepted: bool,
    pub rejected: bool,
}

impl Certainty {
    pub fn any(&self) -> bool {
        self.accepted || self.rejected
    }
}

/// Outcome of evaluating one single policy instance
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Evaluation {
    Decided(bool),
    /// Not decidable yet
    Pending,
    /// Leader has not voted; the fallback policy must open
    OpenDefault(PolicyId),
}

/// Read-only view of one ballot box with everything evaluation needs
#[derive(Clone, Debug)]
pub struct BallotView<'a> {
    pub forest: &'a PolicyForest,
    pub kind: &'a PolicyKind,
    pub rules: &'a VotingRules,
    /// Live votes in the box
    pub votes: Vec<&'a Vote>,
    /// Eligible individuals (after exclusions) with their potential weight
    pub eligible: BTreeMap<IndividualId, f64>,
    pub leader: &'a IndividualId,
    pub element: Option<&'a str>,
    pub has_deadline: bool,
}

impl BallotView<'_> {
    pub fn tally(&self) -> Tally {
        Tally::compute(self.votes.iter().copied(), &self.eligible)
    }

    fn conditions(&self, oracle: &dyn ConditionOracle) -> ConditionState {
        conditions::check(
            self.forest,
            self.rules,
            EvaluationMode::Concurrent,
            &self.votes,
            self.element,
            oracle,
        )
    }

    /// Eligible vetoers who have not voted yet
    fn pending_vetoers(&self) -> bool {
        conditions::vetoers(self.forest, self.rules)
            .iter()
            .any(|v| self.eligible.contains_key(v) && !self.votes.iter().any(|vote| &vote.voter == v))
    }
}

/// Decide a single policy instance
///
/// Composed policies are aggregated by the composition engine and
/// always evaluate as pending here.
pub fn evaluate(view: &BallotView<'_>, oracle: &dyn ConditionOracle) -> Evaluation {
    if let PolicyKind::LeaderDriven { default, .. } = view.kind {
        return match view.conditions(oracle) {
            ConditionState::Fails { .. } => Evaluation::Decided(false),
            ConditionState::Unknown => Evaluation::Pending,
            ConditionState::Holds => view
                .votes
                .iter()
                .find(|v| &v.voter == view.leader)
                .map(|v| Evaluation::Decided(v.agreement))
                .unwrap_or_else(|| Evaluation::OpenDefault(default.clone())),
        };
    }

    let Some(rule) = ThresholdRule::for_kind(view.kind) else {
        return Evaluation::Pending;
    };
    let tally = view.tally();
    if tally.is_empty() {
        return Evaluation::Pending;
    }
    match view.conditions(oracle) {
        ConditionState::Fails { .. } => Evaluation::Decided(false),
        ConditionState::Unknown => Evaluation::Pending,
        ConditionState::Holds => match rule.decide(&tally, view.rules.effective_ratio()) {
            Some(accepted) => Evaluation::Decided(accepted),
            None => Evaluation::Pending,
        },
    }
}

/// Whether a single policy instance can be decided now without waiting
pub fn is_decidable(view: &BallotView<'_>, oracle: &dyn ConditionOracle) -> bool {
    if view.votes.is_empty() {
        return false;
    }
    let state = view.conditions(oracle);

    if matches!(view.kind, PolicyKind::LeaderDriven { .. }) {
        return !matches!(state, ConditionState::Unknown);
    }

    let Some(rule) = ThresholdRule::for_kind(view.kind) else {
        return false;
    };
    match state {
        ConditionState::Fails { permanent } => permanent,
        ConditionState::Unknown => false,
        ConditionState::Holds => {
            let certainty =
                rule.certainty(&view.tally(), view.rules.effective_ratio(), view.has_deadline);
            certainty.rejected
                || (certainty.accepted && !(view.has_deadline && view.pending_vetoers()))
        }
    }
}
