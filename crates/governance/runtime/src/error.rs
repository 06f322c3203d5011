//! Runtime error types

use governance_types::GovernanceError;
use thiserror::Error;

/// Errors that can occur in the governance runtime
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Governance(#[from] GovernanceError),

    /// The platform answered with a failure
    #[error("Platform error: {0}")]
    Platform(String),

    /// A platform call did not answer in time
    #[error("{operation} timed out after {timeout_ms}ms")]
    CheckTimeout { operation: String, timeout_ms: u64 },

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// The runtime has shut down
    #[error("Runtime channel closed")]
    ChannelClosed,

    #[error("Worker task failed: {0}")]
    Worker(String),
}

/// Result type for runtime operations
pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use governance_types::CollaborationId;

    #[test]
    fn test_timeout_display() {
        let err = RuntimeError::CheckTimeout {
            operation: "check_status acme/core#1".into(),
            timeout_ms: 250,
        };
        assert_eq!(err.to_string(), "check_status acme/core#1 timed out after 250ms");
    }

    #[test]
    fn test_governance_errors_pass_through() {
        let err: RuntimeError =
            GovernanceError::CollaborationNotFound(CollaborationId::new("acme/core#1")).into();
        assert_eq!(err.to_string(), "Collaboration not found: acme/core#1");
    }
}
