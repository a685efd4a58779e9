//! PSMP Gateway - stable model abstraction over heterogeneous providers
//!
//! The gateway hides provider health and model availability behind one
//! dispatch surface. Two provider variants exist today: a local runtime
//! speaking the Ollama generate API and a cloud aggregator speaking the
//! OpenAI-compatible chat API. A background monitor probes each provider
//! and marks it unhealthy after consecutive failures; the Secure Gateway
//! reads that state during selection.

#![deny(unsafe_code)]

mod error;
mod gateway;
mod health;
mod mapping;
mod provider;
mod providers;
mod types;

pub use error::GatewayError;
pub use gateway::{DispatchRequest, GatewayConfig, LlmGateway};
pub use health::{HealthEvent, HealthMonitor, HealthMonitorConfig, HealthStatus, ProviderHealth};
pub use mapping::ModelMap;
pub use provider::{Provider, StaticProvider};
pub use providers::{CloudAggregatorProvider, LocalRuntimeProvider};
pub use types::{GenerationRequest, LlmResponse, ProviderKind, TokenUsage};
