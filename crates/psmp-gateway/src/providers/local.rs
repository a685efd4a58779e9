//! Local runtime provider, Ollama generate API

use super::{compose_prompt, truncate};
use crate::error::GatewayError;
use crate::provider::Provider;
use crate::types::{GenerationRequest, LlmResponse, ProviderKind, TokenUsage};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

const GENERATE_PATH: &str = "/api/generate";
const TAGS_PATH: &str = "/api/tags";

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
    prompt_eval_count: Option<u64>,
    eval_count: Option<u64>,
}

/// On-host runtime provider. Data never leaves the machine.
pub struct LocalRuntimeProvider {
    name: String,
    endpoint: String,
    served_models: Vec<String>,
    priority: u8,
    client: Client,
}

impl LocalRuntimeProvider {
    /// Create a provider for an endpoint like `http://127.0.0.1:11434`.
    pub fn new(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        served_models: Vec<String>,
    ) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .no_proxy()
            .build()
            .map_err(|e| GatewayError::ProviderError(format!("http client: {}", e)))?;

        Ok(Self {
            name: name.into(),
            endpoint: endpoint.into(),
            served_models,
            priority: ProviderKind::LocalRuntime.default_priority(),
            client,
        })
    }

    /// Override the selection priority.
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl Provider for LocalRuntimeProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::LocalRuntime
    }

    fn priority(&self) -> u8 {
        self.priority
    }

    fn serves_model(&self, model: &str) -> bool {
        self.served_models.is_empty() || self.served_models.iter().any(|m| m == model)
    }

    async fn check_available(&self) -> bool {
        match self.client.get(self.url(TAGS_PATH)).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<LlmResponse, GatewayError> {
        let mut payload = json!({
            "model": request.model,
            "prompt": compose_prompt(&request.prompt, request.system_prompt.as_deref()),
            "stream": false,
        });

        let mut options = serde_json::Map::new();
        if let Some(temperature) = request.temperature {
            options.insert("temperature".to_string(), json!(temperature));
        }
        if let Some(max_tokens) = request.max_tokens {
            options.insert("num_predict".to_string(), json!(max_tokens));
        }
        if !options.is_empty() {
            payload["options"] = Value::Object(options);
        }

        let response = self
            .client
            .post(self.url(GENERATE_PATH))
            .json(&payload)
            .send()
            .await
            .map_err(|e| GatewayError::ProviderError(format!("local runtime request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::ProviderError(format!(
                "local runtime {}: {}",
                status,
                truncate(&body, 320)
            )));
        }

        let body: OllamaResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::ProviderError(format!("invalid local response: {}", e)))?;

        let total = match (body.prompt_eval_count, body.eval_count) {
            (Some(input), Some(output)) => Some(input + output),
            (one, None) | (None, one) => one,
        };

        Ok(LlmResponse::ok(
            body.response.trim().to_string(),
            self.name.clone(),
            request.model.clone(),
            TokenUsage {
                input_tokens: body.prompt_eval_count,
                output_tokens: body.eval_count,
                total_tokens: total,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_building() {
        let provider =
            LocalRuntimeProvider::new("local_runtime", "http://127.0.0.1:11434/", vec![]).unwrap();
        assert_eq!(
            provider.url(GENERATE_PATH),
            "http://127.0.0.1:11434/api/generate"
        );
    }

    #[test]
    fn test_serves_models() {
        let provider = LocalRuntimeProvider::new(
            "local_runtime",
            "http://127.0.0.1:11434",
            vec!["llama3".to_string()],
        )
        .unwrap();
        assert!(provider.serves_model("llama3"));
        assert!(!provider.serves_model("gpt-4o"));
    }
}
