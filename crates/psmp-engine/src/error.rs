//! Engine error types

use crate::report::BlockingReport;
use psmp_state::StateError;
use psmp_storage::StorageError;
use thiserror::Error;

/// Errors produced by the PSMP engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A dependency spec failed validation or its constraint did not
    /// parse. Caller-recoverable.
    #[error("Invalid declaration: {0}")]
    InvalidDeclaration(String),

    /// The operation was refused because the project is blocked. The
    /// report names every unresolved conflict.
    #[error("Project blocked: {} unresolved conflict(s)", report.total_conflicts)]
    ProjectBlocked { report: Box<BlockingReport> },

    /// No active conflict exists for the named library.
    #[error("Conflict not found for library '{0}'")]
    ConflictNotFound(String),

    /// The artifact does not exist or belongs to another project.
    #[error("Not found: {0}")]
    NotFound(String),

    /// State manager failure (lookup, transition or storage).
    #[error(transparent)]
    State(#[from] StateError),

    /// Direct storage failure.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Storage(StorageError::Serialization(err.to_string()))
    }
}
