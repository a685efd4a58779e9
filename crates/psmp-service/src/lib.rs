//! PSMP Service - construction root for the governance core
//!
//! Builds the five governance components once from a single structured
//! configuration and hands out `Arc` references; no module-global
//! mutable state. Also owns the watchdog that keeps the long-running
//! loops (health probes, audit writer) alive.

#![deny(unsafe_code)]

mod config;
mod service;
mod watchdog;

pub use config::{
    AuditConfig, GovernanceConfig, LlmConfig, LoggingConfig, ProviderConfig, StorageConfig,
};
pub use service::{GovernanceCore, ServiceError};
pub use watchdog::Watchdog;

/// Initialize tracing from the logging configuration. Call once per
/// process.
pub fn init_tracing(config: &LoggingConfig) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.json {
        let _ = builder.json().try_init();
    } else {
        let _ = builder.try_init();
    }
}
