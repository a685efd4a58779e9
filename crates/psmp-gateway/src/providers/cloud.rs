//! Cloud aggregator provider, OpenAI-compatible chat API

use super::truncate;
use crate::error::GatewayError;
use crate::provider::Provider;
use crate::types::{GenerationRequest, LlmResponse, ProviderKind, TokenUsage};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: Option<u64>,
    completion_tokens: Option<u64>,
    total_tokens: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Value,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

/// Hosted aggregator provider behind an OpenAI-compatible API.
pub struct CloudAggregatorProvider {
    name: String,
    endpoint: String,
    api_key: Option<String>,
    priority: u8,
    client: Client,
}

impl CloudAggregatorProvider {
    /// Create a provider for an endpoint like `https://api.example.com/v1`.
    pub fn new(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| GatewayError::ProviderError(format!("http client: {}", e)))?;

        Ok(Self {
            name: name.into(),
            endpoint: endpoint.into(),
            api_key,
            priority: ProviderKind::CloudAggregator.default_priority(),
            client,
        })
    }

    /// Override the selection priority.
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    fn chat_url(&self) -> String {
        let endpoint = self.endpoint.trim_end_matches('/');
        if endpoint.ends_with("/chat/completions") {
            endpoint.to_string()
        } else {
            format!("{}/chat/completions", endpoint)
        }
    }

    fn models_url(&self) -> String {
        format!("{}/models", self.endpoint.trim_end_matches('/'))
    }
}

#[async_trait]
impl Provider for CloudAggregatorProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::CloudAggregator
    }

    fn priority(&self) -> u8 {
        self.priority
    }

    async fn check_available(&self) -> bool {
        let mut request = self.client.get(self.models_url());
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        match request.send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<LlmResponse, GatewayError> {
        let mut messages = Vec::new();
        if let Some(system) = request.system_prompt.as_deref() {
            if !system.trim().is_empty() {
                messages.push(json!({ "role": "system", "content": system }));
            }
        }
        messages.push(json!({ "role": "user", "content": request.prompt }));

        let mut payload = json!({
            "model": request.model,
            "messages": messages,
        });
        if let Some(temperature) = request.temperature {
            payload["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = request.max_tokens {
            payload["max_tokens"] = json!(max_tokens);
        }

        let mut http_request = self.client.post(self.chat_url()).json(&payload);
        if let Some(key) = &self.api_key {
            http_request = http_request.bearer_auth(key);
        }

        let response = http_request
            .send()
            .await
            .map_err(|e| GatewayError::ProviderError(format!("aggregator request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::ProviderError(format!(
                "aggregator {}: {}",
                status,
                truncate(&body, 320)
            )));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::ProviderError(format!("invalid aggregator response: {}", e)))?;

        let choice = body
            .choices
            .first()
            .ok_or_else(|| GatewayError::ProviderError("response had no choices".to_string()))?;

        let content = match &choice.message.content {
            Value::String(text) => text.clone(),
            Value::Array(parts) => parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("\n"),
            _ => String::new(),
        };

        let usage = body
            .usage
            .map(|usage| TokenUsage {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
            })
            .unwrap_or_default();

        Ok(LlmResponse::ok(
            content.trim().to_string(),
            self.name.clone(),
            request.model.clone(),
            usage,
        ))
    }
}
