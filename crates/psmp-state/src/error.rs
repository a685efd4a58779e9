//! State manager error types

use psmp_storage::StorageError;
use psmp_types::{ProjectStatus, TaskStatus};
use thiserror::Error;

/// Errors produced by the state manager.
#[derive(Debug, Error)]
pub enum StateError {
    /// A project with this name already exists in the scope.
    #[error("Duplicate project: '{0}' already exists")]
    DuplicateProject(String),

    /// The requested entity does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The requested project transition is outside the adjacency set.
    #[error("Invalid transition: {from} -> {to} is not allowed")]
    InvalidTransition {
        from: ProjectStatus,
        to: ProjectStatus,
    },

    /// The requested task transition is outside the adjacency set.
    #[error("Invalid task transition: {from} -> {to} is not allowed")]
    InvalidTaskTransition { from: TaskStatus, to: TaskStatus },

    /// A task creation failed validation.
    #[error("Invalid task: {0}")]
    InvalidTask(String),

    /// The storage backend failed; nothing was written.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<serde_json::Error> for StateError {
    fn from(err: serde_json::Error) -> Self {
        StateError::Storage(StorageError::Serialization(err.to_string()))
    }
}
