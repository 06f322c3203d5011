//! Participants: roles, individuals and what they enact per collaboration

use crate::{IndividualId, RoleId, Scope, VoteId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const DEFAULT_VOTE_WEIGHT: f64 = 1.0;

fn default_vote_weight() -> f64 {
    DEFAULT_VOTE_WEIGHT
}

/// A named category of individuals with a default vote weight
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    #[serde(default = "default_vote_weight")]
    pub vote_weight: f64,
    /// Static membership, checked at vote time
    #[serde(default)]
    pub members: BTreeSet<IndividualId>,
}

impl Role {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: RoleId::new(id),
            vote_weight: DEFAULT_VOTE_WEIGHT,
            members: BTreeSet::new(),
        }
    }

    pub fn with_vote_weight(mut self, weight: f64) -> Self {
        self.vote_weight = weight;
        self
    }

    pub fn with_member(mut self, member: impl Into<String>) -> Self {
        self.members.insert(IndividualId::new(member));
        self
    }

    pub fn has_member(&self, individual: &IndividualId) -> bool {
        self.members.contains(individual)
    }
}

/// A human or automated participant
///
/// Declared profiles come from the policy forest; everyone else is
/// created on first reference with default weight and no confidence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Individual {
    pub id: IndividualId,
    /// Fixed weight used when the individual is listed directly as a participant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vote_weight: Option<f64>,
    /// Confidence factor in [0, 1]; present only for automated participants
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default = "Utc::now")]
    pub registered_at: DateTime<Utc>,
}

impl Individual {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: IndividualId::new(id),
            vote_weight: None,
            confidence: None,
            registered_at: Utc::now(),
        }
    }

    pub fn with_vote_weight(mut self, weight: f64) -> Self {
        self.vote_weight = Some(weight);
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn is_automated(&self) -> bool {
        self.confidence.is_some()
    }

    pub fn weight(&self) -> f64 {
        self.vote_weight.unwrap_or(DEFAULT_VOTE_WEIGHT)
    }
}

/// An entry of a policy's participant list
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Participant {
    Role(RoleId),
    Individual(IndividualId),
}

impl Participant {
    pub fn role(id: impl Into<String>) -> Self {
        Participant::Role(RoleId::new(id))
    }

    pub fn individual(id: impl Into<String>) -> Self {
        Participant::Individual(IndividualId::new(id))
    }
}

/// A role an individual enacted by casting a qualifying vote
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnactedRole {
    pub role: RoleId,
    pub scope: Scope,
}

/// Per-collaboration view of an individual: enacted roles and live votes
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndividualRecord {
    pub individual: IndividualId,
    pub enacted_roles: Vec<EnactedRole>,
    pub votes: BTreeSet<VoteId>,
}

impl IndividualRecord {
    pub fn new(individual: IndividualId) -> Self {
        Self {
            individual,
            enacted_roles: Vec::new(),
            votes: BTreeSet::new(),
        }
    }

    pub fn enact(&mut self, role: RoleId, scope: &Scope) {
        if !self.enacts(&role) {
            self.enacted_roles.push(EnactedRole {
                role,
                scope: scope.clone(),
            });
        }
    }

    pub fn enacts(&self, role: &RoleId) -> bool {
        self.enacted_roles.iter().any(|r| &r.role == role)
    }
}
