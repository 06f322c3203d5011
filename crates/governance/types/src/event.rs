//! Events consumed and directives emitted by the governance core

use crate::{CollaborationId, IndividualId, PolicyForest, PolicyId, Scope};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Decision-affecting input
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GovernanceEvent {
    CollaborationProposed {
        id: CollaborationId,
        scope: Scope,
        creator: IndividualId,
        #[serde(default)]
        rationale: Option<String>,
    },
    Voted {
        collaboration_id: CollaborationId,
        individual: IndividualId,
        agreement: bool,
        #[serde(default)]
        rationale: Option<String>,
    },
    DeadlineElapsed {
        collaboration_id: CollaborationId,
        policy: PolicyId,
    },
    LeaderReassigned {
        collaboration_id: CollaborationId,
        leader: IndividualId,
    },
    PolicyReloaded {
        forest: PolicyForest,
    },
    UserRegistered {
        login: IndividualId,
    },
}

impl GovernanceEvent {
    /// Collaboration this event is ordered under, if any
    pub fn collaboration_id(&self) -> Option<&CollaborationId> {
        match self {
            GovernanceEvent::CollaborationProposed { id, .. } => Some(id),
            GovernanceEvent::Voted {
                collaboration_id, ..
            }
            | GovernanceEvent::DeadlineElapsed {
                collaboration_id, ..
            }
            | GovernanceEvent::LeaderReassigned {
                collaboration_id, ..
            } => Some(collaboration_id),
            GovernanceEvent::PolicyReloaded { .. } | GovernanceEvent::UserRegistered { .. } => {
                None
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            GovernanceEvent::CollaborationProposed { .. } => "collaboration_proposed",
            GovernanceEvent::Voted { .. } => "voted",
            GovernanceEvent::DeadlineElapsed { .. } => "deadline_elapsed",
            GovernanceEvent::LeaderReassigned { .. } => "leader_reassigned",
            GovernanceEvent::PolicyReloaded { .. } => "policy_reloaded",
            GovernanceEvent::UserRegistered { .. } => "user_registered",
        }
    }
}

/// Output for the runtime to schedule or execute
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "directive", rename_all = "snake_case")]
pub enum Directive {
    ScheduleDeadline {
        collaboration_id: CollaborationId,
        policy: PolicyId,
        at: DateTime<Utc>,
    },
    DecisionReached {
        collaboration_id: CollaborationId,
        policy: PolicyId,
        accepted: bool,
        /// Whether `policy` is the collaboration's governing root
        root: bool,
    },
    SetLabel {
        collaboration_id: CollaborationId,
        element: String,
        label: String,
    },
    Merge {
        collaboration_id: CollaborationId,
        element: String,
    },
}

impl Directive {
    pub fn collaboration_id(&self) -> &CollaborationId {
        match self {
            Directive::ScheduleDeadline {
                collaboration_id, ..
            }
            | Directive::DecisionReached {
                collaboration_id, ..
            }
            | Directive::SetLabel {
                collaboration_id, ..
            }
            | Directive::Merge {
                collaboration_id, ..
            } => collaboration_id,
        }
    }
}

/// A platform fact a condition needs answered
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "query", rename_all = "snake_case")]
pub enum ExternalQuery {
    /// Do the element's status checks pass?
    Status { element: String },
    /// Does the element carry this label?
    Label { element: String, label: String },
}

/// Where a collaboration stands
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CollaborationOutcome {
    /// No policy matched the scope; never decided
    Ungoverned,
    /// PRE conditions rejected every phase; never opened
    Stalled,
    /// Instances open, no root decision yet
    Pending,
    Decided { accepted: bool },
}

impl CollaborationOutcome {
    pub fn is_final(&self) -> bool {
        !matches!(self, CollaborationOutcome::Pending)
    }
}
