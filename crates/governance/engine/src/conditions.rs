//! Condition evaluators
//!
//! Conditions run in one of three modes. PRE conditions gate whether a
//! policy opens at all, CONCURRENT ones gate every decision and
//! decidability check, POST ones run after an affirmative decision and
//! only produce platform actions.
//!
//! Participant exclusion is not a predicate: it shrinks the eligible set.
//! Excluded individuals are turned away when they vote and skipped when
//! votes carry over, so their votes never reach a ballot box.

use crate::facts::ConditionOracle;
use governance_types::{
    ConditionKind, EvaluationMode, ExternalQuery, IndividualId, PolicyForest, PolicyId, Vote,
    VotingRules,
};
use std::collections::BTreeSet;

/// Result of checking a set of conditions
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConditionState {
    Holds,
    /// Failed; `permanent` when no later vote can make it hold (a cast veto)
    Fails { permanent: bool },
    /// An external answer is missing
    Unknown,
}

impl ConditionState {
    fn combine(self, other: ConditionState) -> ConditionState {
        use ConditionState::*;
        match (self, other) {
            (Fails { permanent: true }, _) | (_, Fails { permanent: true }) => {
                Fails { permanent: true }
            }
            (Fails { .. }, _) | (_, Fails { .. }) => Fails { permanent: false },
            (Unknown, _) | (_, Unknown) => Unknown,
            (Holds, Holds) => Holds,
        }
    }

    pub fn holds(&self) -> bool {
        matches!(self, ConditionState::Holds)
    }
}

/// Individuals excluded from a policy by its exclusion conditions
pub fn excluded_individuals(forest: &PolicyForest, rules: &VotingRules) -> BTreeSet<IndividualId> {
    rules
        .conditions
        .iter()
        .filter(|c| c.mode != EvaluationMode::Post)
        .filter_map(|c| match &c.kind {
            ConditionKind::ParticipantExclusion { excluded } => Some(forest.expand(excluded)),
            _ => None,
        })
        .flatten()
        .collect()
}

/// Individuals holding a veto over a policy
pub fn vetoers(forest: &PolicyForest, rules: &VotingRules) -> BTreeSet<IndividualId> {
    rules
        .conditions_in(EvaluationMode::Concurrent)
        .filter_map(|c| match &c.kind {
            ConditionKind::VetoRight { vetoers } => Some(forest.expand(vetoers)),
            _ => None,
        })
        .flatten()
        .collect()
}

/// Check every condition of `mode` against the given votes
pub fn check(
    forest: &PolicyForest,
    rules: &VotingRules,
    mode: EvaluationMode,
    votes: &[&Vote],
    element: Option<&str>,
    oracle: &dyn ConditionOracle,
) -> ConditionState {
    rules
        .conditions_in(mode)
        .map(|condition| match &condition.kind {
            ConditionKind::MinimumParticipants { min } => {
                if votes.len() >= *min {
                    ConditionState::Holds
                } else {
                    ConditionState::Fails { permanent: false }
                }
            }
            ConditionKind::VetoRight { vetoers } => {
                let vetoers = forest.expand(vetoers);
                if votes
                    .iter()
                    .any(|v| !v.agreement && vetoers.contains(&v.voter))
                {
                    ConditionState::Fails { permanent: true }
                } else {
                    ConditionState::Holds
                }
            }
            ConditionKind::ParticipantExclusion { .. } => ConditionState::Holds,
            ConditionKind::CheckStatus => {
                answered(element.and_then(|e| oracle.status_passes(e)), element)
            }
            ConditionKind::Labels { labels, inclusion } => {
                labels
                    .iter()
                    .map(|label| {
                        answered(
                            element
                                .and_then(|e| oracle.has_label(e, label))
                                .map(|present| present == *inclusion),
                            element,
                        )
                    })
                    .fold(ConditionState::Holds, ConditionState::combine)
            }
        })
        .fold(ConditionState::Holds, ConditionState::combine)
}

fn answered(answer: Option<bool>, element: Option<&str>) -> ConditionState {
    match (answer, element) {
        (Some(true), _) => ConditionState::Holds,
        (Some(false), _) => ConditionState::Fails { permanent: false },
        // Nothing to ask about outside patch scopes
        (None, None) => ConditionState::Fails { permanent: false },
        (None, Some(_)) => ConditionState::Unknown,
    }
}

/// Whether a policy may open, checked before any vote exists
pub fn pre_conditions_hold(
    forest: &PolicyForest,
    rules: &VotingRules,
    element: Option<&str>,
    oracle: &dyn ConditionOracle,
) -> bool {
    check(forest, rules, EvaluationMode::Pre, &[], element, oracle).holds()
}

/// Labels to apply after an affirmative decision
pub fn post_labels(rules: &VotingRules) -> Vec<String> {
    rules
        .conditions_in(EvaluationMode::Post)
        .filter_map(|c| match &c.kind {
            ConditionKind::Labels {
                labels,
                inclusion: true,
            } => Some(labels.iter().cloned()),
            _ => None,
        })
        .flatten()
        .collect()
}

/// Platform facts needed to evaluate the tree rooted at `root`
pub fn external_queries(
    forest: &PolicyForest,
    root: &PolicyId,
    element: Option<&str>,
) -> BTreeSet<ExternalQuery> {
    let Some(element) = element else {
        return BTreeSet::new();
    };
    let mut queries = BTreeSet::new();
    for policy in forest.subtree(root) {
        let Some(rules) = policy.rules() else {
            continue;
        };
        for condition in rules.conditions.iter().filter(|c| c.mode != EvaluationMode::Post) {
            match &condition.kind {
                ConditionKind::CheckStatus => {
                    queries.insert(ExternalQuery::Status {
                        element: element.to_string(),
                    });
                }
                ConditionKind::Labels { labels, .. } => {
                    queries.extend(labels.iter().map(|label| ExternalQuery::Label {
                        element: element.to_string(),
                        label: label.clone(),
                    }));
                }
                _ => {}
            }
        }
    }
    queries
}
