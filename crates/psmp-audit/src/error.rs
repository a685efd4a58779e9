//! Audit error types

use thiserror::Error;

/// Errors produced by the compliance auditor.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The sink could not persist an entry.
    #[error("Audit failure: {0}")]
    Failure(String),

    /// An entry could not be encoded or decoded.
    #[error("Audit serialization error: {0}")]
    Serialization(String),

    /// The writer queue is gone or rejected the entry.
    #[error("Audit queue unavailable: {0}")]
    QueueUnavailable(String),
}

impl From<std::io::Error> for AuditError {
    fn from(err: std::io::Error) -> Self {
        AuditError::Failure(err.to_string())
    }
}

impl From<serde_json::Error> for AuditError {
    fn from(err: serde_json::Error) -> Self {
        AuditError::Serialization(err.to_string())
    }
}
