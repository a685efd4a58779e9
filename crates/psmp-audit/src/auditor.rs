//! Compliance auditor facade
//!
//! Producers hand entries to the auditor; a single writer task drains the
//! queue into the sink so concurrent appends never interleave. Strict
//! mode propagates backpressure and durability errors to the caller;
//! best-effort mode sheds load into a drop counter.

use crate::entry::{AuditEntry, PartialAuditEntry};
use crate::error::AuditError;
use crate::integrity::{verify_chain, ChainVerification};
use crate::query::AuditQuery;
use crate::report::{summarize, AuditSummary};
use crate::sink::AuditSink;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Default queue high-water mark.
pub const DEFAULT_QUEUE_DEPTH: usize = 10_000;

/// How appends behave when the sink is slow or failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditMode {
    /// Block callers until the entry is durable; surface failures.
    Strict,
    /// Enqueue without waiting; count drops on overflow.
    BestEffort,
}

/// Auditor configuration.
#[derive(Debug, Clone)]
pub struct AuditorConfig {
    /// Organization the log belongs to
    pub organization: String,

    /// Append behavior
    pub mode: AuditMode,

    /// Queue high-water mark
    pub queue_depth: usize,
}

impl AuditorConfig {
    /// Strict-audit configuration for an organization.
    pub fn strict(organization: impl Into<String>) -> Self {
        Self {
            organization: organization.into(),
            mode: AuditMode::Strict,
            queue_depth: DEFAULT_QUEUE_DEPTH,
        }
    }

    /// Best-effort configuration for an organization.
    pub fn best_effort(organization: impl Into<String>) -> Self {
        Self {
            organization: organization.into(),
            mode: AuditMode::BestEffort,
            queue_depth: DEFAULT_QUEUE_DEPTH,
        }
    }
}

struct WriteRequest {
    entry: PartialAuditEntry,
    ack: Option<oneshot::Sender<Result<AuditEntry, AuditError>>>,
}

/// Append-only, queryable compliance event sink.
pub struct ComplianceAuditor {
    config: AuditorConfig,
    sink: Arc<dyn AuditSink>,
    tx: mpsc::Sender<WriteRequest>,
    rx: Arc<Mutex<mpsc::Receiver<WriteRequest>>>,
    dropped: Arc<AtomicU64>,
    heartbeat: Arc<AtomicI64>,
    writer: Mutex<Option<JoinHandle<()>>>,
}

impl ComplianceAuditor {
    /// Create an auditor and start its writer task.
    pub fn new(config: AuditorConfig, sink: Arc<dyn AuditSink>) -> Arc<Self> {
        let (tx, rx) = mpsc::channel(config.queue_depth);

        let auditor = Arc::new(Self {
            config,
            sink,
            tx,
            rx: Arc::new(Mutex::new(rx)),
            dropped: Arc::new(AtomicU64::new(0)),
            heartbeat: Arc::new(AtomicI64::new(now_millis())),
            writer: Mutex::new(None),
        });

        let handle = auditor.spawn_writer();
        // The lock cannot be contended before `new` returns.
        if let Ok(mut writer) = auditor.writer.try_lock() {
            *writer = Some(handle);
        }

        auditor
    }

    fn spawn_writer(self: &Arc<Self>) -> JoinHandle<()> {
        let rx = Arc::clone(&self.rx);
        let sink = Arc::clone(&self.sink);
        let heartbeat = Arc::clone(&self.heartbeat);

        tokio::spawn(async move {
            let mut rx = rx.lock().await;
            let mut tick = tokio::time::interval(std::time::Duration::from_secs(5));
            loop {
                tokio::select! {
                    request = rx.recv() => {
                        let Some(request) = request else { break };
                        heartbeat.store(now_millis(), Ordering::Relaxed);
                        let result = sink.write(request.entry).await;
                        if let Err(err) = &result {
                            warn!(error = %err, "Audit sink write failed");
                        }
                        if let Some(ack) = request.ack {
                            let _ = ack.send(result);
                        }
                    }
                    _ = tick.tick() => {
                        heartbeat.store(now_millis(), Ordering::Relaxed);
                    }
                }
            }
            info!("Audit writer drained and stopped");
        })
    }

    /// Organization this auditor records for.
    pub fn organization(&self) -> &str {
        &self.config.organization
    }

    /// Append an entry.
    ///
    /// Strict mode returns the finalized entry once it is durable.
    /// Best-effort mode returns `None` immediately; overflow is counted,
    /// not surfaced.
    pub async fn append(
        &self,
        entry: PartialAuditEntry,
    ) -> Result<Option<AuditEntry>, AuditError> {
        match self.config.mode {
            AuditMode::Strict => {
                let (ack_tx, ack_rx) = oneshot::channel();
                self.tx
                    .send(WriteRequest {
                        entry,
                        ack: Some(ack_tx),
                    })
                    .await
                    .map_err(|_| {
                        AuditError::QueueUnavailable("writer stopped".to_string())
                    })?;
                let written = ack_rx
                    .await
                    .map_err(|_| AuditError::QueueUnavailable("writer dropped ack".to_string()))??;
                Ok(Some(written))
            }
            AuditMode::BestEffort => {
                match self.tx.try_send(WriteRequest { entry, ack: None }) {
                    Ok(()) => Ok(None),
                    Err(_) => {
                        let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                        warn!(dropped_total = total, "Audit queue full, entry dropped");
                        Ok(None)
                    }
                }
            }
        }
    }

    /// Entries dropped under best-effort overflow.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Milliseconds since the writer last showed signs of life.
    pub fn heartbeat_age_millis(&self) -> i64 {
        now_millis() - self.heartbeat.load(Ordering::Relaxed)
    }

    /// Abort and respawn the writer task. Used by the watchdog when the
    /// loop stops heartbeating.
    pub async fn restart_writer(self: &Arc<Self>) {
        let mut writer = self.writer.lock().await;
        if let Some(handle) = writer.take() {
            handle.abort();
        }
        warn!("Restarting audit writer");
        *writer = Some(self.spawn_writer());
    }

    /// Query the log, ascending by timestamp.
    pub async fn query(&self, query: &AuditQuery) -> Result<Vec<AuditEntry>, AuditError> {
        let entries = self.sink.read_all().await?;
        Ok(query.apply(&entries))
    }

    /// Summarize a window of the log.
    pub async fn summarize(&self, query: &AuditQuery) -> Result<AuditSummary, AuditError> {
        Ok(summarize(&self.query(query).await?))
    }

    /// Verify the hash chain over the whole log.
    pub async fn verify(&self) -> Result<ChainVerification, AuditError> {
        let entries = self.sink.read_all().await?;
        Ok(verify_chain(&entries))
    }
}

impl Drop for ComplianceAuditor {
    fn drop(&mut self) {
        if let Ok(mut writer) = self.writer.try_lock() {
            if let Some(handle) = writer.take() {
                handle.abort();
            }
        }
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
