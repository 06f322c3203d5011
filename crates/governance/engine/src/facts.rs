//! External facts consulted by platform-backed conditions
//!
//! The engine never performs I/O. Callers resolve the [`ExternalQuery`]
//! set up front (with whatever timeout and retry policy they need) and
//! hand the answers in through a [`ConditionOracle`]. An unanswered
//! query makes its condition fail closed.

use governance_types::ExternalQuery;
use std::collections::BTreeMap;

/// Source of answers for external conditions
pub trait ConditionOracle {
    /// `None` when the answer is unknown (timed out, not resolved)
    fn answer(&self, query: &ExternalQuery) -> Option<bool>;

    fn status_passes(&self, element: &str) -> Option<bool> {
        self.answer(&ExternalQuery::Status {
            element: element.to_string(),
        })
    }

    fn has_label(&self, element: &str, label: &str) -> Option<bool> {
        self.answer(&ExternalQuery::Label {
            element: element.to_string(),
            label: label.to_string(),
        })
    }
}

/// Snapshot of resolved external answers
#[derive(Clone, Debug, Default)]
pub struct ExternalFacts {
    answers: BTreeMap<ExternalQuery, bool>,
}

impl ExternalFacts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, query: ExternalQuery, answer: bool) {
        self.answers.insert(query, answer);
    }

    pub fn with(mut self, query: ExternalQuery, answer: bool) -> Self {
        self.insert(query, answer);
        self
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }
}

impl ConditionOracle for ExternalFacts {
    fn answer(&self, query: &ExternalQuery) -> Option<bool> {
        self.answers.get(query).copied()
    }
}

impl FromIterator<(ExternalQuery, bool)> for ExternalFacts {
    fn from_iter<T: IntoIterator<Item = (ExternalQuery, bool)>>(iter: T) -> Self {
        Self {
            answers: iter.into_iter().collect(),
        }
    }
}
