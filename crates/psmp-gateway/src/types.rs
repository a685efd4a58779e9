//! Gateway request and response types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Provider variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// On-host runtime, data never leaves the machine
    LocalRuntime,
    /// Hosted multi-model aggregator
    CloudAggregator,
}

impl ProviderKind {
    /// Default selection priority, lower is preferred.
    pub fn default_priority(&self) -> u8 {
        match self {
            ProviderKind::LocalRuntime => 1,
            ProviderKind::CloudAggregator => 2,
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::LocalRuntime => f.write_str("local_runtime"),
            ProviderKind::CloudAggregator => f.write_str("cloud_aggregator"),
        }
    }
}

/// One generation request, already provider-agnostic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Requested model name
    pub model: String,

    /// User prompt
    pub prompt: String,

    /// Optional system prompt
    pub system_prompt: Option<String>,

    /// Sampling temperature
    pub temperature: Option<f32>,

    /// Output token cap
    pub max_tokens: Option<u32>,
}

/// Token accounting, when the provider reports it.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
}

/// Response returned to agents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    /// Generated text, empty on failure
    pub content: String,

    /// Provider that served (or refused) the request
    pub provider: String,

    /// Model that actually ran, after mapping and substitution
    pub model: String,

    /// Token usage, if reported
    pub usage: TokenUsage,

    /// Whether generation succeeded
    pub success: bool,

    /// Failure category and detail when `success` is false
    pub error: Option<String>,

    /// Completion timestamp
    pub created_at: DateTime<Utc>,
}

impl LlmResponse {
    /// Successful response.
    pub fn ok(
        content: impl Into<String>,
        provider: impl Into<String>,
        model: impl Into<String>,
        usage: TokenUsage,
    ) -> Self {
        Self {
            content: content.into(),
            provider: provider.into(),
            model: model.into(),
            usage,
            success: true,
            error: None,
            created_at: Utc::now(),
        }
    }

    /// Failed response carrying an error category.
    pub fn failed(
        provider: impl Into<String>,
        model: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            content: String::new(),
            provider: provider.into(),
            model: model.into(),
            usage: TokenUsage::default(),
            success: false,
            error: Some(error.into()),
            created_at: Utc::now(),
        }
    }
}
