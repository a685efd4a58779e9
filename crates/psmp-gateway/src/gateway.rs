//! LLM gateway facade
//!
//! Receives a provider selection from the Secure Gateway, translates the
//! model name, and dispatches with a timeout and an idempotent retry
//! budget. Fallback to the next-priority provider happens only when the
//! caller's sensitivity permits it.

use crate::error::GatewayError;
use crate::health::{HealthMonitor, HealthMonitorConfig};
use crate::mapping::ModelMap;
use crate::provider::Provider;
use crate::types::{GenerationRequest, LlmResponse, ProviderKind};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Per-request deadline
    pub request_timeout: Duration,

    /// Retries after the first attempt; generation is side-effect free
    pub max_retries: u32,

    /// Health monitor settings
    pub health: HealthMonitorConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_retries: 2,
            health: HealthMonitorConfig::default(),
        }
    }
}

/// One dispatch as handed over by the Secure Gateway.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    /// Provider the Secure Gateway selected
    pub provider: String,

    /// Whether the sensitivity permits falling back to another provider
    pub allow_fallback: bool,

    /// The generation request
    pub request: GenerationRequest,
}

/// Health-tracked provider registry and dispatcher.
pub struct LlmGateway {
    config: GatewayConfig,
    providers: Vec<Arc<dyn Provider>>,
    monitor: Arc<HealthMonitor>,
    model_map: ModelMap,
}

impl LlmGateway {
    /// Create a gateway over a provider set.
    pub fn new(
        config: GatewayConfig,
        mut providers: Vec<Arc<dyn Provider>>,
        model_map: ModelMap,
    ) -> Self {
        providers.sort_by_key(|p| p.priority());
        let monitor = Arc::new(HealthMonitor::new(config.health.clone(), providers.clone()));
        Self {
            config,
            providers,
            monitor,
            model_map,
        }
    }

    /// The health monitor, shared with the Secure Gateway and watchdog.
    pub fn monitor(&self) -> Arc<HealthMonitor> {
        Arc::clone(&self.monitor)
    }

    /// Model map in use.
    pub fn model_map(&self) -> &ModelMap {
        &self.model_map
    }

    /// Start background health monitoring.
    pub async fn start(&self) {
        self.monitor.probe_all().await;
        self.monitor.start().await;
    }

    /// Registered providers in priority order.
    pub fn providers(&self) -> impl Iterator<Item = (&str, ProviderKind, u8)> {
        self.providers
            .iter()
            .map(|p| (p.name(), p.kind(), p.priority()))
    }

    /// Names of providers that are currently healthy, in priority order.
    pub async fn healthy_providers(&self) -> Vec<String> {
        let mut healthy = Vec::new();
        for provider in &self.providers {
            if self.monitor.is_healthy(provider.name()).await {
                healthy.push(provider.name().to_string());
            }
        }
        healthy
    }

    fn find_provider(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.iter().find(|p| p.name() == name).cloned()
    }

    /// Dispatch a generation request.
    ///
    /// Unknown providers fail immediately; an unhealthy provider falls
    /// through to the next priority only when `allow_fallback` is set.
    /// After the retry budget is exhausted the response comes back with
    /// `success = false` and the failure category in `error`.
    #[instrument(skip(self, dispatch), fields(provider = %dispatch.provider, model = %dispatch.request.model))]
    pub async fn dispatch(&self, dispatch: DispatchRequest) -> Result<LlmResponse, GatewayError> {
        let selected = self
            .find_provider(&dispatch.provider)
            .ok_or_else(|| GatewayError::UnavailableProvider(dispatch.provider.clone()))?;

        let provider = if self.monitor.is_healthy(selected.name()).await {
            selected
        } else if dispatch.allow_fallback {
            let fallback = self.next_healthy_excluding(selected.name()).await;
            match fallback {
                Some(provider) => {
                    info!(
                        from = selected.name(),
                        to = provider.name(),
                        "Falling back to next-priority provider"
                    );
                    provider
                }
                None => {
                    return Err(GatewayError::UnavailableProvider(
                        "no healthy provider for fallback".to_string(),
                    ))
                }
            }
        } else {
            return Err(GatewayError::UnavailableProvider(format!(
                "provider '{}' is unhealthy and fallback is not permitted",
                selected.name()
            )));
        };

        let mut request = dispatch.request;
        request.model = self
            .model_map
            .resolve(&request.model, |m| provider.serves_model(m));

        let attempts = 1 + self.config.max_retries;
        let mut last_error: Option<GatewayError> = None;

        for attempt in 1..=attempts {
            match tokio::time::timeout(self.config.request_timeout, provider.generate(&request))
                .await
            {
                Ok(Ok(response)) => return Ok(response),
                Ok(Err(err)) => {
                    warn!(attempt, error = %err, "Generation attempt failed");
                    last_error = Some(err);
                }
                Err(_) => {
                    let timeout = GatewayError::Timeout {
                        provider: provider.name().to_string(),
                        seconds: self.config.request_timeout.as_secs(),
                    };
                    warn!(attempt, error = %timeout, "Generation attempt timed out");
                    last_error = Some(timeout);
                }
            }
        }

        let error = last_error
            .unwrap_or_else(|| GatewayError::ProviderError("no attempt was made".to_string()));
        Ok(LlmResponse::failed(
            provider.name(),
            request.model,
            format!("{}: {}", error.category(), error),
        ))
    }

    async fn next_healthy_excluding(&self, excluded: &str) -> Option<Arc<dyn Provider>> {
        for provider in &self.providers {
            if provider.name() == excluded {
                continue;
            }
            if self.monitor.is_healthy(provider.name()).await {
                return Some(provider.clone());
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::StaticProvider;

    fn request(model: &str) -> GenerationRequest {
        GenerationRequest {
            model: model.to_string(),
            prompt: "write a haiku".to_string(),
            system_prompt: None,
            temperature: Some(0.2),
            max_tokens: Some(128),
        }
    }

    fn gateway_with(
        local: Arc<StaticProvider>,
        cloud: Arc<StaticProvider>,
    ) -> LlmGateway {
        LlmGateway::new(
            GatewayConfig::default(),
            vec![local, cloud],
            ModelMap::new("llama3"),
        )
    }

    #[tokio::test]
    async fn test_dispatch_to_selected_provider() {
        let local = Arc::new(StaticProvider::new(
            "local_runtime",
            ProviderKind::LocalRuntime,
        ));
        let cloud = Arc::new(StaticProvider::new(
            "cloud_aggregator",
            ProviderKind::CloudAggregator,
        ));
        let gateway = gateway_with(Arc::clone(&local), cloud);

        let response = gateway
            .dispatch(DispatchRequest {
                provider: "local_runtime".to_string(),
                allow_fallback: true,
                request: request("llama3"),
            })
            .await
            .unwrap();

        assert!(response.success);
        assert_eq!(response.provider, "local_runtime");
        assert_eq!(local.call_count(), 1);
    }

    #[tokio::test]
    async fn test_fallback_when_permitted() {
        let local = Arc::new(StaticProvider::new(
            "local_runtime",
            ProviderKind::LocalRuntime,
        ));
        let cloud = Arc::new(StaticProvider::new(
            "cloud_aggregator",
            ProviderKind::CloudAggregator,
        ));
        local.set_available(false);
        let gateway = gateway_with(Arc::clone(&local), Arc::clone(&cloud));
        gateway.monitor().probe_all().await;
        gateway.monitor().mark_unhealthy("local_runtime");

        let response = gateway
            .dispatch(DispatchRequest {
                provider: "local_runtime".to_string(),
                allow_fallback: true,
                request: request("llama3"),
            })
            .await
            .unwrap();

        assert!(response.success);
        assert_eq!(response.provider, "cloud_aggregator");
        assert_eq!(cloud.call_count(), 1);
        assert_eq!(local.call_count(), 0);
    }

    #[tokio::test]
    async fn test_no_fallback_when_forbidden() {
        let local = Arc::new(StaticProvider::new(
            "local_runtime",
            ProviderKind::LocalRuntime,
        ));
        let cloud = Arc::new(StaticProvider::new(
            "cloud_aggregator",
            ProviderKind::CloudAggregator,
        ));
        local.set_available(false);
        let gateway = gateway_with(Arc::clone(&local), cloud);
        gateway.monitor().probe_all().await;
        gateway.monitor().mark_unhealthy("local_runtime");

        let result = gateway
            .dispatch(DispatchRequest {
                provider: "local_runtime".to_string(),
                allow_fallback: false,
                request: request("llama3"),
            })
            .await;

        assert!(matches!(result, Err(GatewayError::UnavailableProvider(_))));
    }

    #[tokio::test]
    async fn test_model_substitution_is_visible() {
        let local = Arc::new(
            StaticProvider::new("local_runtime", ProviderKind::LocalRuntime)
                .with_served_models(vec!["llama3".to_string()]),
        );
        let cloud = Arc::new(StaticProvider::new(
            "cloud_aggregator",
            ProviderKind::CloudAggregator,
        ));
        let gateway = gateway_with(local, cloud);

        let response = gateway
            .dispatch(DispatchRequest {
                provider: "local_runtime".to_string(),
                allow_fallback: false,
                request: request("gpt-4o"),
            })
            .await
            .unwrap();

        // gpt-4o is not served locally and has no mapping: the default
        // local model substitutes and shows in the response.
        assert_eq!(response.model, "llama3");
    }

    #[tokio::test]
    async fn test_retry_exhaustion_returns_failed_response() {
        let local = Arc::new(StaticProvider::new(
            "local_runtime",
            ProviderKind::LocalRuntime,
        ));
        local.set_fail_generation(true);
        let cloud = Arc::new(StaticProvider::new(
            "cloud_aggregator",
            ProviderKind::CloudAggregator,
        ));
        let gateway = gateway_with(Arc::clone(&local), cloud);

        let response = gateway
            .dispatch(DispatchRequest {
                provider: "local_runtime".to_string(),
                allow_fallback: false,
                request: request("llama3"),
            })
            .await
            .unwrap();

        assert!(!response.success);
        assert!(response.error.as_deref().unwrap().starts_with("provider_error"));
        // One attempt plus the retry budget.
        assert_eq!(local.call_count(), 3);
    }

    #[tokio::test]
    async fn test_unknown_provider_rejected() {
        let local = Arc::new(StaticProvider::new(
            "local_runtime",
            ProviderKind::LocalRuntime,
        ));
        let cloud = Arc::new(StaticProvider::new(
            "cloud_aggregator",
            ProviderKind::CloudAggregator,
        ));
        let gateway = gateway_with(local, cloud);

        let result = gateway
            .dispatch(DispatchRequest {
                provider: "mystery".to_string(),
                allow_fallback: true,
                request: request("llama3"),
            })
            .await;
        assert!(matches!(result, Err(GatewayError::UnavailableProvider(_))));
    }

    #[tokio::test]
    async fn test_healthy_providers_in_priority_order() {
        let local = Arc::new(StaticProvider::new(
            "local_runtime",
            ProviderKind::LocalRuntime,
        ));
        let cloud = Arc::new(StaticProvider::new(
            "cloud_aggregator",
            ProviderKind::CloudAggregator,
        ));
        let gateway = gateway_with(local, cloud);
        gateway.monitor().probe_all().await;

        let healthy = gateway.healthy_providers().await;
        assert_eq!(healthy, vec!["local_runtime", "cloud_aggregator"]);

        gateway.monitor().mark_unhealthy("local_runtime");
        let healthy = gateway.healthy_providers().await;
        assert_eq!(healthy, vec!["cloud_aggregator"]);
    }
}
