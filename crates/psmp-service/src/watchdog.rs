//! Liveness watchdog for long-running loops

use psmp_audit::ComplianceAuditor;
use psmp_gateway::HealthMonitor;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::warn;

/// Pings the health-probe loop and the audit writer; a loop that stops
/// heartbeating is restarted and the restart logged.
pub struct Watchdog {
    interval: Duration,
    stale_after_millis: i64,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Watchdog {
    /// Create a watchdog with the default 30 s ping interval.
    pub fn new() -> Self {
        Self::with_interval(Duration::from_secs(30))
    }

    /// Create a watchdog with a custom ping interval; loops older than
    /// three intervals count as stuck.
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            stale_after_millis: (interval.as_millis() as i64) * 3,
            handle: Mutex::new(None),
        }
    }

    /// Start watching.
    pub async fn start(&self, monitor: Arc<HealthMonitor>, auditor: Arc<ComplianceAuditor>) {
        let mut handle = self.handle.lock().await;
        if handle.is_some() {
            return;
        }

        let interval = self.interval;
        let stale_after = self.stale_after_millis;
        *handle = Some(tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            // The first tick fires immediately; skip it so fresh loops
            // are not judged before they ran once.
            tick.tick().await;
            loop {
                tick.tick().await;

                let probe_age = monitor.heartbeat_age_millis();
                if probe_age > stale_after {
                    warn!(age_millis = probe_age, "Health probe loop is stuck, restarting");
                    monitor.restart().await;
                }

                let writer_age = auditor.heartbeat_age_millis();
                if writer_age > stale_after {
                    warn!(age_millis = writer_age, "Audit writer is stuck, restarting");
                    auditor.restart_writer().await;
                }
            }
        }));
    }

    /// Stop watching.
    pub async fn stop(&self) {
        let mut handle = self.handle.lock().await;
        if let Some(task) = handle.take() {
            task.abort();
        }
    }
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        if let Ok(handle) = self.handle.try_lock() {
            if let Some(task) = handle.as_ref() {
                task.abort();
            }
        }
    }
}
