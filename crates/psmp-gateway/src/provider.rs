//! Provider trait and a static in-memory implementation

use crate::error::GatewayError;
use crate::types::{GenerationRequest, LlmResponse, ProviderKind, TokenUsage};
use async_trait::async_trait;
use parking_lot::RwLock;

/// An LLM execution provider.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Registry name, e.g. `local_runtime`.
    fn name(&self) -> &str;

    /// Provider variant.
    fn kind(&self) -> ProviderKind;

    /// Selection priority, lower is preferred.
    fn priority(&self) -> u8 {
        self.kind().default_priority()
    }

    /// Whether the provider serves `model` without mapping.
    fn serves_model(&self, _model: &str) -> bool {
        true
    }

    /// Availability probe. Must complete within the caller's bounded
    /// check window; the monitor wraps it in a timeout.
    async fn check_available(&self) -> bool;

    /// Run one generation. Side-effect free, safe to retry.
    async fn generate(&self, request: &GenerationRequest) -> Result<LlmResponse, GatewayError>;
}

/// Deterministic provider for tests and simulations: fixed availability,
/// canned responses, call counting.
pub struct StaticProvider {
    name: String,
    kind: ProviderKind,
    priority: u8,
    available: RwLock<bool>,
    fail_generation: RwLock<bool>,
    served_models: Vec<String>,
    calls: RwLock<u32>,
}

impl StaticProvider {
    /// A provider that always succeeds.
    pub fn new(name: impl Into<String>, kind: ProviderKind) -> Self {
        let kind_priority = kind.default_priority();
        Self {
            name: name.into(),
            kind,
            priority: kind_priority,
            available: RwLock::new(true),
            fail_generation: RwLock::new(false),
            served_models: Vec::new(),
            calls: RwLock::new(0),
        }
    }

    /// Restrict the models this provider claims to serve. Empty means
    /// everything.
    pub fn with_served_models(mut self, models: Vec<String>) -> Self {
        self.served_models = models;
        self
    }

    /// Override the priority.
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Flip availability.
    pub fn set_available(&self, available: bool) {
        *self.available.write() = available;
    }

    /// Make every generation fail with a provider error.
    pub fn set_fail_generation(&self, fail: bool) {
        *self.fail_generation.write() = fail;
    }

    /// Number of generate calls seen.
    pub fn call_count(&self) -> u32 {
        *self.calls.read()
    }
}

#[async_trait]
impl Provider for StaticProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn priority(&self) -> u8 {
        self.priority
    }

    fn serves_model(&self, model: &str) -> bool {
        self.served_models.is_empty() || self.served_models.iter().any(|m| m == model)
    }

    async fn check_available(&self) -> bool {
        *self.available.read()
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<LlmResponse, GatewayError> {
        *self.calls.write() += 1;
        if *self.fail_generation.read() {
            return Err(GatewayError::ProviderError(format!(
                "{} refused generation",
                self.name
            )));
        }
        Ok(LlmResponse::ok(
            format!("echo: {}", request.prompt),
            self.name.clone(),
            request.model.clone(),
            TokenUsage::default(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_provider_roundtrip() {
        let provider = StaticProvider::new("local_runtime", ProviderKind::LocalRuntime);
        assert!(provider.check_available().await);

        let response = provider
            .generate(&GenerationRequest {
                model: "llama3".to_string(),
                prompt: "hello".to_string(),
                system_prompt: None,
                temperature: None,
                max_tokens: None,
            })
            .await
            .unwrap();
        assert!(response.success);
        assert_eq!(response.provider, "local_runtime");
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_served_models_filter() {
        let provider = StaticProvider::new("local_runtime", ProviderKind::LocalRuntime)
            .with_served_models(vec!["llama3".to_string()]);
        assert!(provider.serves_model("llama3"));
        assert!(!provider.serves_model("gpt-4o"));
    }
}
