//! Provider health monitoring
//!
//! A background loop probes every registered provider; consecutive
//! failures past a threshold mark it unhealthy until the next successful
//! probe. Probe results are cached so selection never waits on a slow
//! provider more than once per cache window.

use crate::provider::Provider;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Health of one provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Last probe succeeded
    Healthy,
    /// Consecutive failures crossed the threshold
    Unhealthy,
    /// Never probed
    Unknown,
}

/// Probe bookkeeping per provider.
#[derive(Debug, Clone)]
pub struct ProviderHealth {
    /// Current status
    pub status: HealthStatus,

    /// Failures since the last success
    pub consecutive_failures: u32,

    /// When the provider was last probed
    pub last_check: Option<DateTime<Utc>>,
}

impl Default for ProviderHealth {
    fn default() -> Self {
        Self {
            status: HealthStatus::Unknown,
            consecutive_failures: 0,
            last_check: None,
        }
    }
}

/// Monitor configuration.
#[derive(Debug, Clone)]
pub struct HealthMonitorConfig {
    /// Background probe interval
    pub check_interval: Duration,

    /// Bounded window for one probe
    pub probe_timeout: Duration,

    /// Probe results younger than this are trusted without re-probing
    pub cache_window: Duration,

    /// Consecutive failures before a provider goes unhealthy
    pub failure_threshold: u32,
}

impl Default for HealthMonitorConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(60),
            probe_timeout: Duration::from_millis(500),
            cache_window: Duration::from_secs(60),
            failure_threshold: 3,
        }
    }
}

/// Events emitted by the monitor.
#[derive(Debug, Clone)]
pub enum HealthEvent {
    /// A provider's status changed.
    StatusChanged {
        provider: String,
        old: HealthStatus,
        new: HealthStatus,
    },
}

/// Continuous provider health monitor.
pub struct HealthMonitor {
    config: HealthMonitorConfig,
    providers: Vec<Arc<dyn Provider>>,
    states: DashMap<String, ProviderHealth>,
    event_tx: broadcast::Sender<HealthEvent>,
    heartbeat: Arc<AtomicI64>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl HealthMonitor {
    /// Create a monitor over a provider set.
    pub fn new(config: HealthMonitorConfig, providers: Vec<Arc<dyn Provider>>) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        let states = DashMap::new();
        for provider in &providers {
            states.insert(provider.name().to_string(), ProviderHealth::default());
        }
        Self {
            config,
            providers,
            states,
            event_tx,
            heartbeat: Arc::new(AtomicI64::new(Utc::now().timestamp_millis())),
            handle: Mutex::new(None),
        }
    }

    /// Subscribe to health events.
    pub fn subscribe(&self) -> broadcast::Receiver<HealthEvent> {
        self.event_tx.subscribe()
    }

    /// Current health snapshot for one provider.
    pub fn health_of(&self, provider: &str) -> Option<ProviderHealth> {
        self.states.get(provider).map(|h| h.clone())
    }

    /// Whether a provider is currently usable, probing on demand when
    /// the cached result is stale.
    pub async fn is_healthy(&self, provider: &str) -> bool {
        let state = match self.health_of(provider) {
            Some(state) => state,
            None => return false,
        };

        let stale = match state.last_check {
            None => true,
            Some(last) => {
                let age = Utc::now().signed_duration_since(last);
                age.num_milliseconds() as u128 > self.config.cache_window.as_millis()
            }
        };

        if stale {
            self.probe(provider).await;
        }

        self.health_of(provider)
            .map(|h| h.status != HealthStatus::Unhealthy)
            .unwrap_or(false)
    }

    /// Force a provider unhealthy until its next successful probe.
    pub fn mark_unhealthy(&self, provider: &str) {
        if let Some(mut state) = self.states.get_mut(provider) {
            let old = state.status;
            state.status = HealthStatus::Unhealthy;
            state.consecutive_failures = self.config.failure_threshold;
            state.last_check = Some(Utc::now());
            drop(state);
            if old != HealthStatus::Unhealthy {
                let _ = self.event_tx.send(HealthEvent::StatusChanged {
                    provider: provider.to_string(),
                    old,
                    new: HealthStatus::Unhealthy,
                });
            }
        }
    }

    /// Probe one provider and fold the result into its state.
    pub async fn probe(&self, provider_name: &str) {
        let Some(provider) = self
            .providers
            .iter()
            .find(|p| p.name() == provider_name)
            .cloned()
        else {
            return;
        };

        let available = tokio::time::timeout(self.config.probe_timeout, provider.check_available())
            .await
            .unwrap_or(false);

        let mut state = self
            .states
            .entry(provider_name.to_string())
            .or_default();
        let old = state.status;

        if available {
            state.status = HealthStatus::Healthy;
            state.consecutive_failures = 0;
        } else {
            state.consecutive_failures += 1;
            if state.consecutive_failures >= self.config.failure_threshold {
                state.status = HealthStatus::Unhealthy;
            } else if state.status == HealthStatus::Unknown {
                // Not yet condemned; give it the remaining attempts.
                state.status = HealthStatus::Healthy;
            }
        }
        state.last_check = Some(Utc::now());
        let new = state.status;
        drop(state);

        debug!(provider = provider_name, available, ?new, "Probe completed");
        if old != new {
            info!(provider = provider_name, ?old, ?new, "Provider health changed");
            let _ = self.event_tx.send(HealthEvent::StatusChanged {
                provider: provider_name.to_string(),
                old,
                new,
            });
        }
    }

    /// Probe every provider once.
    pub async fn probe_all(&self) {
        let names: Vec<String> = self.providers.iter().map(|p| p.name().to_string()).collect();
        for name in names {
            self.probe(&name).await;
        }
        self.heartbeat
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    /// Start the background probe loop.
    pub async fn start(self: &Arc<Self>) {
        let mut handle = self.handle.lock().await;
        if handle.is_some() {
            return;
        }
        *handle = Some(self.spawn_loop());
    }

    fn spawn_loop(self: &Arc<Self>) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(monitor.config.check_interval);
            loop {
                tick.tick().await;
                monitor.probe_all().await;
            }
        })
    }

    /// Milliseconds since the probe loop last completed a sweep.
    pub fn heartbeat_age_millis(&self) -> i64 {
        Utc::now().timestamp_millis() - self.heartbeat.load(Ordering::Relaxed)
    }

    /// Abort and respawn the probe loop. Used by the watchdog.
    pub async fn restart(self: &Arc<Self>) {
        let mut handle = self.handle.lock().await;
        if let Some(old) = handle.take() {
            old.abort();
        }
        warn!("Restarting health probe loop");
        *handle = Some(self.spawn_loop());
    }

    /// Stop the probe loop.
    pub async fn stop(&self) {
        let mut handle = self.handle.lock().await;
        if let Some(old) = handle.take() {
            old.abort();
        }
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        if let Ok(handle) = self.handle.try_lock() {
            if let Some(task) = handle.as_ref() {
                task.abort();
            }
        }
    }
}
