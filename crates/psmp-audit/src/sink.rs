//! Audit sinks

use crate::entry::{AuditEntry, PartialAuditEntry};
use crate::error::AuditError;
use crate::integrity::IntegrityChain;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::path::PathBuf;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Destination for finalized audit entries.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Chain, persist and return the finalized entry. Durable before
    /// returning.
    async fn write(&self, entry: PartialAuditEntry) -> Result<AuditEntry, AuditError>;

    /// Read the whole log back in append order.
    async fn read_all(&self) -> Result<Vec<AuditEntry>, AuditError>;

    /// Number of entries written so far.
    fn entry_count(&self) -> u64;
}

/// In-memory sink for tests.
pub struct MemoryAuditSink {
    entries: RwLock<Vec<AuditEntry>>,
    chain: RwLock<IntegrityChain>,
    chained: bool,
}

impl MemoryAuditSink {
    /// Create a sink, hash-chaining entries when `chained`.
    pub fn new(chained: bool) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            chain: RwLock::new(IntegrityChain::new()),
            chained,
        }
    }

    /// Snapshot of all entries.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.read().clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn write(&self, partial: PartialAuditEntry) -> Result<AuditEntry, AuditError> {
        let entry = {
            let mut chain = self.chain.write();
            let entry = partial.finalize(chain.previous_hash(), self.chained);
            chain.update(&entry);
            entry
        };
        self.entries.write().push(entry.clone());
        Ok(entry)
    }

    async fn read_all(&self) -> Result<Vec<AuditEntry>, AuditError> {
        Ok(self.entries())
    }

    fn entry_count(&self) -> u64 {
        self.chain.read().entry_count()
    }
}

/// File sink appending one JSON line per entry.
pub struct FileAuditSink {
    path: PathBuf,
    chain: RwLock<IntegrityChain>,
    chained: bool,
}

impl FileAuditSink {
    /// Open a sink at `path`, resuming the chain from existing entries.
    pub async fn open(path: PathBuf, chained: bool) -> Result<Self, AuditError> {
        let chain = if path.exists() {
            let entries = read_entries(&path).await?;
            let last_hash = entries.last().and_then(|e| e.entry_hash.clone());
            IntegrityChain::from_state(last_hash, entries.len() as u64)
        } else {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            IntegrityChain::new()
        };

        Ok(Self {
            path,
            chain: RwLock::new(chain),
            chained,
        })
    }

    /// Path of the log file.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

async fn read_entries(path: &PathBuf) -> Result<Vec<AuditEntry>, AuditError> {
    let file = match File::open(path).await {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };

    let reader = BufReader::new(file);
    let mut lines = reader.lines();
    let mut entries = Vec::new();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        entries.push(serde_json::from_str(&line)?);
    }
    Ok(entries)
}

#[async_trait]
impl AuditSink for FileAuditSink {
    async fn write(&self, partial: PartialAuditEntry) -> Result<AuditEntry, AuditError> {
        // Scope the chain lock so it is not held across the file I/O.
        let (entry, line) = {
            let mut chain = self.chain.write();
            let entry = partial.finalize(chain.previous_hash(), self.chained);
            chain.update(&entry);
            let line = serde_json::to_string(&entry)?;
            (entry, line)
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.sync_all().await?;

        Ok(entry)
    }

    async fn read_all(&self) -> Result<Vec<AuditEntry>, AuditError> {
        read_entries(&self.path).await
    }

    fn entry_count(&self) -> u64 {
        self.chain.read().entry_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::PolicyDecision;
    use crate::integrity::verify_chain;
    use psmp_types::{DataResidency, Sensitivity};

    fn partial(agent: &str) -> PartialAuditEntry {
        AuditEntry::builder()
            .agent_name(agent)
            .task_type("ideation")
            .sensitivity(Sensitivity::Public)
            .selected_provider("local_runtime")
            .policy_decision(PolicyDecision::Allowed)
            .policy_name("default_local_first")
            .organization("acme")
            .data_residency(DataResidency::Local)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_memory_sink_chains() {
        let sink = MemoryAuditSink::new(true);
        let first = sink.write(partial("a")).await.unwrap();
        let second = sink.write(partial("b")).await.unwrap();

        assert_eq!(sink.entry_count(), 2);
        assert_eq!(second.prev_hash, first.entry_hash);
        assert!(verify_chain(&sink.entries()).valid);
    }

    #[tokio::test]
    async fn test_file_sink_appends_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("compliance_audit_acme.jsonl");

        let sink = FileAuditSink::open(path.clone(), true).await.unwrap();
        sink.write(partial("a")).await.unwrap();
        sink.write(partial("b")).await.unwrap();
        sink.write(partial("c")).await.unwrap();

        let entries = sink.read_all().await.unwrap();
        assert_eq!(entries.len(), 3);
        assert!(verify_chain(&entries).valid);

        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw.lines().count(), 3);
    }

    #[tokio::test]
    async fn test_file_sink_resumes_chain_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("compliance_audit_acme.jsonl");

        {
            let sink = FileAuditSink::open(path.clone(), true).await.unwrap();
            sink.write(partial("a")).await.unwrap();
            sink.write(partial("b")).await.unwrap();
        }

        let sink = FileAuditSink::open(path.clone(), true).await.unwrap();
        assert_eq!(sink.entry_count(), 2);
        sink.write(partial("c")).await.unwrap();

        let entries = sink.read_all().await.unwrap();
        assert_eq!(entries.len(), 3);
        assert!(verify_chain(&entries).valid);
    }
}
