//! Storage trait definitions

use crate::error::StorageError;
use async_trait::async_trait;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Log name of the governance event stream.
pub const EVENT_LOG: &str = "psmp_events";

/// Kinds of governed entities a backend can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Project,
    Task,
    Artifact,
    Checkpoint,
    Resolution,
}

impl EntityKind {
    /// Directory name used by file backends.
    pub fn dir(&self) -> &'static str {
        match self {
            EntityKind::Project => "projects",
            EntityKind::Task => "tasks",
            EntityKind::Artifact => "artifacts",
            EntityKind::Checkpoint => "checkpoints",
            EntityKind::Resolution => "resolutions",
        }
    }

    /// All kinds, for backend initialization.
    pub fn all() -> &'static [EntityKind] {
        &[
            EntityKind::Project,
            EntityKind::Task,
            EntityKind::Artifact,
            EntityKind::Checkpoint,
            EntityKind::Resolution,
        ]
    }
}

/// One write in a transaction batch.
#[derive(Debug, Clone)]
pub enum WriteOp {
    /// Store a record under `(kind, id)`.
    Put {
        kind: EntityKind,
        id: String,
        bytes: Vec<u8>,
    },

    /// Remove a record if present.
    Delete { kind: EntityKind, id: String },

    /// Append a record to a named log.
    Append {
        log: String,
        record: serde_json::Value,
    },
}

/// Durable key/value persistence with append-only logs.
///
/// Keys may contain `/` to express nesting (checkpoints are stored under
/// `<project_id>/<checkpoint_id>`). Reads never require coordination;
/// writers serialize internally.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Store a record, replacing any previous value. Atomic.
    async fn put(&self, kind: EntityKind, id: &str, bytes: Vec<u8>) -> StorageResult<()>;

    /// Fetch a record, `None` when absent.
    async fn get(&self, kind: EntityKind, id: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Remove a record. Returns whether it existed.
    async fn delete(&self, kind: EntityKind, id: &str) -> StorageResult<bool>;

    /// All records of a kind as `(id, bytes)` pairs, unordered.
    async fn scan(&self, kind: EntityKind) -> StorageResult<Vec<(String, Vec<u8>)>>;

    /// Records of a kind whose id starts with `prefix`.
    async fn scan_prefix(
        &self,
        kind: EntityKind,
        prefix: &str,
    ) -> StorageResult<Vec<(String, Vec<u8>)>> {
        let mut records = self.scan(kind).await?;
        records.retain(|(id, _)| id.starts_with(prefix));
        Ok(records)
    }

    /// Append one record to a named log, durable before returning.
    async fn append(&self, log: &str, record: serde_json::Value) -> StorageResult<()>;

    /// Read a log back in append order.
    async fn read_log(&self, log: &str) -> StorageResult<Vec<serde_json::Value>>;

    /// Apply a bounded batch of writes as a unit.
    ///
    /// Backends serialize transactions against each other; on failure no
    /// prior write of the batch remains visible.
    async fn transaction(&self, ops: Vec<WriteOp>) -> StorageResult<()>;
}
