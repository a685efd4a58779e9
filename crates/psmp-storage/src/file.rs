//! File-backed storage with atomic single-record writes
//!
//! Layout under the root directory:
//!
//! ```text
//! projects/<id>
//! tasks/<id>
//! artifacts/<id>
//! checkpoints/<project_id>/<checkpoint_id>
//! resolutions/<id>
//! psmp_events.jsonl
//! ```
//!
//! Record writes go to a temp file first and are renamed into place, so a
//! crashed write never leaves a half-record. Log appends are flushed and
//! fsynced before returning.

use crate::error::StorageError;
use crate::traits::{EntityKind, Storage, StorageResult, WriteOp};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, warn};

/// File-system storage backend.
pub struct FileStorage {
    root: PathBuf,
    // Serializes transactions and log appends.
    write_lock: tokio::sync::Mutex<()>,
}

impl FileStorage {
    /// Open (creating if needed) a backend rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        for kind in EntityKind::all() {
            tokio::fs::create_dir_all(root.join(kind.dir())).await?;
        }
        debug!(root = %root.display(), "Opened file storage");
        Ok(Self {
            root,
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Root directory of this backend.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, kind: EntityKind, id: &str) -> StorageResult<PathBuf> {
        validate_key(id)?;
        Ok(self.root.join(kind.dir()).join(id))
    }

    fn log_path(&self, log: &str) -> StorageResult<PathBuf> {
        validate_key(log)?;
        Ok(self.root.join(format!("{}.jsonl", log)))
    }

    async fn write_atomic(&self, path: &Path, bytes: &[u8]) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = path.with_extension("tmp");
        let mut file = File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    async fn append_record(&self, log: &str, record: &serde_json::Value) -> StorageResult<()> {
        let path = self.log_path(log)?;
        let line = serde_json::to_string(record)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.sync_all().await?;
        Ok(())
    }

    async fn collect_records(
        &self,
        dir: PathBuf,
        base: &Path,
        out: &mut Vec<(String, Vec<u8>)>,
    ) -> StorageResult<()> {
        let mut pending = vec![dir];
        while let Some(current) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&current).await {
                Ok(entries) => entries,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(err) => return Err(err.into()),
            };

            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending.push(path);
                    continue;
                }
                if path.extension().is_some_and(|ext| ext == "tmp") {
                    continue;
                }

                let id = path
                    .strip_prefix(base)
                    .map_err(|_| StorageError::InvalidKey(path.display().to_string()))?
                    .to_string_lossy()
                    .replace(std::path::MAIN_SEPARATOR, "/");
                let bytes = tokio::fs::read(&path).await?;
                out.push((id, bytes));
            }
        }
        Ok(())
    }
}

fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty()
        || key.starts_with('/')
        || key.split('/').any(|part| part.is_empty() || part == "." || part == "..")
    {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

#[async_trait]
impl Storage for FileStorage {
    async fn put(&self, kind: EntityKind, id: &str, bytes: Vec<u8>) -> StorageResult<()> {
        let path = self.record_path(kind, id)?;
        self.write_atomic(&path, &bytes).await
    }

    async fn get(&self, kind: EntityKind, id: &str) -> StorageResult<Option<Vec<u8>>> {
        let path = self.record_path(kind, id)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn delete(&self, kind: EntityKind, id: &str) -> StorageResult<bool> {
        let path = self.record_path(kind, id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn scan(&self, kind: EntityKind) -> StorageResult<Vec<(String, Vec<u8>)>> {
        let base = self.root.join(kind.dir());
        let mut records = Vec::new();
        self.collect_records(base.clone(), &base, &mut records)
            .await?;
        Ok(records)
    }

    async fn append(&self, log: &str, record: serde_json::Value) -> StorageResult<()> {
        let _guard = self.write_lock.lock().await;
        self.append_record(log, &record).await
    }

    async fn read_log(&self, log: &str) -> StorageResult<Vec<serde_json::Value>> {
        let path = self.log_path(log)?;
        let file = match File::open(&path).await {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let reader = BufReader::new(file);
        let mut lines = reader.lines();
        let mut records = Vec::new();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(&line)?);
        }
        Ok(records)
    }

    async fn transaction(&self, ops: Vec<WriteOp>) -> StorageResult<()> {
        let _guard = self.write_lock.lock().await;

        // Resolve every path up front so a malformed op fails before
        // anything touches disk.
        let mut plan = Vec::with_capacity(ops.len());
        for op in &ops {
            let planned = match op {
                WriteOp::Put { kind, id, bytes } => PlannedOp::Put {
                    path: self.record_path(*kind, id)?,
                    bytes: bytes.clone(),
                },
                WriteOp::Delete { kind, id } => PlannedOp::Delete {
                    path: self.record_path(*kind, id)?,
                },
                WriteOp::Append { log, record } => PlannedOp::Append {
                    path: self.log_path(log)?,
                    line: serde_json::to_string(record)?,
                },
            };
            plan.push(planned);
        }

        // Stage puts to temp files; nothing is visible yet.
        let mut staged = Vec::new();
        for planned in &plan {
            if let PlannedOp::Put { path, bytes } = planned {
                if let Some(parent) = path.parent() {
                    if let Err(err) = tokio::fs::create_dir_all(parent).await {
                        remove_temps(&staged).await;
                        return Err(err.into());
                    }
                }
                let tmp = path.with_extension("tmp");
                if let Err(err) = write_file(&tmp, bytes).await {
                    remove_temps(&staged).await;
                    return Err(err);
                }
                staged.push(tmp);
            }
        }

        // Commit in order, remembering how to undo each applied step.
        let mut applied = Vec::new();
        if let Err(err) = apply_plan(&plan, &mut applied).await {
            rollback(&applied).await;
            remove_temps(&staged).await;
            return Err(err);
        }

        Ok(())
    }
}

enum PlannedOp {
    Put { path: PathBuf, bytes: Vec<u8> },
    Delete { path: PathBuf },
    Append { path: PathBuf, line: String },
}

enum Undo {
    Put {
        path: PathBuf,
        prior: Option<Vec<u8>>,
    },
    Delete {
        path: PathBuf,
        prior: Vec<u8>,
    },
    Append {
        path: PathBuf,
        prior_len: u64,
    },
}

async fn apply_plan(plan: &[PlannedOp], applied: &mut Vec<Undo>) -> StorageResult<()> {
    for planned in plan {
        match planned {
            PlannedOp::Put { path, .. } => {
                let prior = read_optional(path).await?;
                let tmp = path.with_extension("tmp");
                tokio::fs::rename(&tmp, path).await?;
                applied.push(Undo::Put {
                    path: path.clone(),
                    prior,
                });
            }
            PlannedOp::Delete { path } => {
                let Some(prior) = read_optional(path).await? else {
                    continue;
                };
                tokio::fs::remove_file(path).await?;
                applied.push(Undo::Delete {
                    path: path.clone(),
                    prior,
                });
            }
            PlannedOp::Append { path, line } => {
                let prior_len = match tokio::fs::metadata(path).await {
                    Ok(meta) => meta.len(),
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => 0,
                    Err(err) => return Err(err.into()),
                };
                let mut file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .await?;
                // Undo first: a half-written line must be truncated too.
                applied.push(Undo::Append {
                    path: path.clone(),
                    prior_len,
                });
                file.write_all(line.as_bytes()).await?;
                file.write_all(b"\n").await?;
                file.sync_all().await?;
            }
        }
    }
    Ok(())
}

// Best effort: a rollback failure on top of a write failure is logged,
// not surfaced, since the original error is what the caller acts on.
async fn rollback(applied: &[Undo]) {
    for undo in applied.iter().rev() {
        let result = match undo {
            Undo::Put { path, prior } => match prior {
                Some(bytes) => write_file(path, bytes).await,
                None => remove_quiet(path).await,
            },
            Undo::Delete { path, prior } => write_file(path, prior).await,
            Undo::Append { path, prior_len } => truncate_to(path, *prior_len).await,
        };
        if let Err(err) = result {
            warn!(error = %err, "Transaction rollback step failed");
        }
    }
}

async fn read_optional(path: &Path) -> StorageResult<Option<Vec<u8>>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

async fn write_file(path: &Path, bytes: &[u8]) -> StorageResult<()> {
    let mut file = File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    Ok(())
}

async fn remove_quiet(path: &Path) -> StorageResult<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

async fn truncate_to(path: &Path, len: u64) -> StorageResult<()> {
    if len == 0 {
        return remove_quiet(path).await;
    }
    let file = OpenOptions::new().write(true).open(path).await?;
    file.set_len(len).await?;
    file.sync_all().await?;
    Ok(())
}

async fn remove_temps(staged: &[PathBuf]) {
    for tmp in staged {
        if let Err(err) = remove_quiet(tmp).await {
            warn!(error = %err, "Failed to remove staged temp file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).await.unwrap();

        storage
            .put(EntityKind::Project, "p1", b"record".to_vec())
            .await
            .unwrap();
        assert_eq!(
            storage.get(EntityKind::Project, "p1").await.unwrap(),
            Some(b"record".to_vec())
        );
        assert_eq!(storage.get(EntityKind::Project, "p2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_nested_checkpoint_keys() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).await.unwrap();

        storage
            .put(EntityKind::Checkpoint, "proj-1/cp-1", b"snap".to_vec())
            .await
            .unwrap();
        storage
            .put(EntityKind::Checkpoint, "proj-1/cp-2", b"snap2".to_vec())
            .await
            .unwrap();

        let records = storage
            .scan_prefix(EntityKind::Checkpoint, "proj-1/")
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).await.unwrap();

        let result = storage
            .put(EntityKind::Project, "../escape", b"x".to_vec())
            .await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_event_log_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();

        {
            let storage = FileStorage::open(dir.path()).await.unwrap();
            storage
                .append("psmp_events", json!({ "event_type": "PROJECT_CREATED" }))
                .await
                .unwrap();
            storage
                .append("psmp_events", json!({ "event_type": "STATE_TRANSITION" }))
                .await
                .unwrap();
        }

        let storage = FileStorage::open(dir.path()).await.unwrap();
        let log = storage.read_log("psmp_events").await.unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0]["event_type"], "PROJECT_CREATED");
        assert_eq!(log[1]["event_type"], "STATE_TRANSITION");
    }

    #[tokio::test]
    async fn test_transaction_rolls_back_put_when_append_fails() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).await.unwrap();

        // A directory squatting on the log path makes the append fail
        // after the put has already been renamed into place.
        std::fs::create_dir(dir.path().join("broken.jsonl")).unwrap();

        let result = storage
            .transaction(vec![
                WriteOp::Put {
                    kind: EntityKind::Project,
                    id: "p1".to_string(),
                    bytes: b"new".to_vec(),
                },
                WriteOp::Append {
                    log: "broken".to_string(),
                    record: json!({ "event_type": "PROJECT_CREATED" }),
                },
            ])
            .await;

        assert!(result.is_err());
        assert_eq!(storage.get(EntityKind::Project, "p1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_transaction_restores_prior_value_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).await.unwrap();

        storage
            .put(EntityKind::Project, "p1", b"old".to_vec())
            .await
            .unwrap();
        std::fs::create_dir(dir.path().join("broken.jsonl")).unwrap();

        let result = storage
            .transaction(vec![
                WriteOp::Put {
                    kind: EntityKind::Project,
                    id: "p1".to_string(),
                    bytes: b"new".to_vec(),
                },
                WriteOp::Append {
                    log: "broken".to_string(),
                    record: json!({ "event_type": "STATE_TRANSITION" }),
                },
            ])
            .await;

        assert!(result.is_err());
        assert_eq!(
            storage.get(EntityKind::Project, "p1").await.unwrap(),
            Some(b"old".to_vec())
        );
    }

    #[tokio::test]
    async fn test_transaction_truncates_partial_appends_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).await.unwrap();

        storage
            .append("psmp_events", json!({ "event_type": "PROJECT_CREATED" }))
            .await
            .unwrap();
        std::fs::create_dir(dir.path().join("broken.jsonl")).unwrap();

        let result = storage
            .transaction(vec![
                WriteOp::Append {
                    log: "psmp_events".to_string(),
                    record: json!({ "event_type": "ARTIFACT_DECLARED" }),
                },
                WriteOp::Append {
                    log: "broken".to_string(),
                    record: json!({ "event_type": "CONFLICT_DETECTED" }),
                },
            ])
            .await;

        assert!(result.is_err());
        let log = storage.read_log("psmp_events").await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0]["event_type"], "PROJECT_CREATED");
    }

    #[tokio::test]
    async fn test_transaction_undoes_deletes_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).await.unwrap();

        storage
            .put(EntityKind::Task, "t1", b"task".to_vec())
            .await
            .unwrap();
        std::fs::create_dir(dir.path().join("broken.jsonl")).unwrap();

        let result = storage
            .transaction(vec![
                WriteOp::Delete {
                    kind: EntityKind::Task,
                    id: "t1".to_string(),
                },
                WriteOp::Append {
                    log: "broken".to_string(),
                    record: json!({ "event_type": "TASK_STATUS_CHANGED" }),
                },
            ])
            .await;

        assert!(result.is_err());
        assert_eq!(
            storage.get(EntityKind::Task, "t1").await.unwrap(),
            Some(b"task".to_vec())
        );
    }

    #[tokio::test]
    async fn test_transaction_writes_entity_and_event() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).await.unwrap();

        storage
            .transaction(vec![
                WriteOp::Put {
                    kind: EntityKind::Artifact,
                    id: "a1".to_string(),
                    bytes: b"artifact".to_vec(),
                },
                WriteOp::Append {
                    log: "psmp_events".to_string(),
                    record: json!({ "event_type": "ARTIFACT_DECLARED" }),
                },
            ])
            .await
            .unwrap();

        assert!(storage
            .get(EntityKind::Artifact, "a1")
            .await
            .unwrap()
            .is_some());
        assert_eq!(storage.read_log("psmp_events").await.unwrap().len(), 1);
    }
}
