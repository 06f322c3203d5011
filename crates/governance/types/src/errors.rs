//! Error types for the governance layer
//!
//! Only malformed policy structure and misuse of collaboration ids are
//! errors. Unmatched scopes, ineligible votes and undecidable ballots are
//! ordinary outcomes reported through result enums.

use crate::{CollaborationId, IndividualId, PolicyId, RoleId};

/// Errors that can occur in governance operations
#[derive(Debug, thiserror::Error)]
pub enum GovernanceError {
    #[error("Policy not found: {0}")]
    PolicyNotFound(PolicyId),

    #[error("Duplicate policy: {0}")]
    DuplicatePolicy(PolicyId),

    #[error("Policy {policy} references unknown role {role}")]
    UnknownRole { policy: PolicyId, role: RoleId },

    #[error("Policy {policy} references unknown policy {reference}")]
    UnknownPolicyReference { policy: PolicyId, reference: PolicyId },

    #[error("Policy cycle through {0}")]
    PolicyCycle(PolicyId),

    #[error("Policy {child} is owned by both {first} and {second}")]
    SharedPhase {
        child: PolicyId,
        first: PolicyId,
        second: PolicyId,
    },

    #[error("Leader-driven policy {0} has no default policy")]
    MissingDefault(PolicyId),

    #[error("Composed policy {0} has no phases")]
    EmptyComposition(PolicyId),

    #[error("Policy {policy} has invalid ratio {ratio}")]
    InvalidRatio { policy: PolicyId, ratio: f64 },

    #[error("Invalid policy {policy}: {reason}")]
    InvalidPolicy { policy: PolicyId, reason: String },

    #[error("Invalid role {role}: {reason}")]
    InvalidRole { role: RoleId, reason: String },

    #[error("Invalid profile for {individual}: {reason}")]
    InvalidProfile {
        individual: IndividualId,
        reason: String,
    },

    #[error("Collaboration not found: {0}")]
    CollaborationNotFound(CollaborationId),

    #[error("Collaboration already exists: {0}")]
    CollaborationAlreadyExists(CollaborationId),
}

/// Result type alias for governance operations
pub type GovernanceResult<T> = Result<T, GovernanceError>;
