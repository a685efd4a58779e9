//! Gateway error types
//!
//! Callers map the categories to their own error taxonomy; `category()`
//! is the stable wire name.

use thiserror::Error;

/// Errors produced by the LLM gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// No healthy provider could take the request.
    #[error("No available provider: {0}")]
    UnavailableProvider(String),

    /// The model is not served and could not be mapped.
    #[error("Unknown model '{0}'")]
    ModelUnknown(String),

    /// The provider did not answer within the deadline.
    #[error("Provider '{provider}' timed out after {seconds}s")]
    Timeout { provider: String, seconds: u64 },

    /// The provider answered with an error.
    #[error("Provider error: {0}")]
    ProviderError(String),

    /// Routing policy refused the dispatch.
    #[error("Policy violation: {0}")]
    PolicyViolation(String),
}

impl GatewayError {
    /// Stable category name for callers.
    pub fn category(&self) -> &'static str {
        match self {
            GatewayError::UnavailableProvider(_) => "unavailable_provider",
            GatewayError::ModelUnknown(_) => "model_unknown",
            GatewayError::Timeout { .. } => "timeout",
            GatewayError::ProviderError(_) => "provider_error",
            GatewayError::PolicyViolation(_) => "policy_violation",
        }
    }
}
