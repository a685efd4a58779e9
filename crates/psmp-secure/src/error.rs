//! Secure gateway error types

use psmp_types::Sensitivity;
use thiserror::Error;

/// Errors produced by the secure gateway.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The active policy vetoed the call. Not retriable without
    /// changing inputs.
    #[error("Policy violation under '{policy_name}' for {sensitivity} task: {reason}")]
    PolicyViolation {
        policy_name: String,
        sensitivity: Sensitivity,
        reason: String,
    },

    /// The mandatory audit write failed and the configuration requires
    /// escalation.
    #[error("Audit obligation failed under '{policy_name}': {reason}")]
    AuditObligation {
        policy_name: String,
        reason: String,
    },
}
