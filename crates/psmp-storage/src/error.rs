//! Storage error types

use thiserror::Error;

/// Errors produced by storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not complete a read or write.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// A record could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A key escaped the backend root or was otherwise malformed.
    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Unavailable(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}
