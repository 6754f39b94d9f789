//! LiteLLM proxy provider (OpenAI-compatible chat completions)
//!
//! Structured output goes through `response_format.json_schema`. The proxy
//! has no search grounding, so responses never carry sources.
//!
//! Configuration:
//! - base_url: LiteLLM proxy URL (default: http://localhost:4000)
//! - api_key_env: point at LITELLM_MASTER_KEY or similar
//! - models.fast / models.detailed: model aliases as configured in the proxy

use super::{
    HealthStatus, InferenceProvider, InferenceRequest, InferenceResponse, ProviderError,
    TokenUsage, check_endpoint,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::debug;

/// LiteLLM Proxy provider
pub struct LiteLLMProvider {
    client: Client,
    base_url: String,
    api_key: String,
}

impl LiteLLMProvider {
    /// Create a new LiteLLM provider with default URL (http://localhost:4000)
    pub fn new(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Self::with_base_url("http://localhost:4000", api_key, Duration::from_secs(120))
    }

    /// Create with a custom base URL
    pub fn with_base_url(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            base_url,
            api_key: api_key.into(),
        })
    }
}

const SYSTEM_PROMPT: &str =
    "You are an automotive safety data service. Answer only with JSON matching the requested schema.";

/// OpenAI-compatible chat request
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    response_format: ResponseFormat,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
    json_schema: JsonSchemaFormat,
}

#[derive(Serialize)]
struct JsonSchemaFormat {
    name: &'static str,
    schema: Value,
}

/// OpenAI-compatible chat response
#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

fn build_body(request: &InferenceRequest) -> ChatRequest {
    ChatRequest {
        model: request.model.clone(),
        messages: vec![
            ChatMessage {
                role: "system".to_string(),
                content: SYSTEM_PROMPT.to_string(),
            },
            ChatMessage {
                role: "user".to_string(),
                content: request.prompt.clone(),
            },
        ],
        temperature: request.temperature,
        response_format: ResponseFormat {
            kind: "json_schema",
            json_schema: JsonSchemaFormat {
                name: "response",
                schema: request.response_schema.to_json_schema(),
            },
        },
        stream: false,
    }
}

#[async_trait]
impl InferenceProvider for LiteLLMProvider {
    fn name(&self) -> &str {
        "litellm"
    }

    async fn generate(&self, request: &InferenceRequest) -> Result<InferenceResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        if request.grounding {
            debug!(model = %request.model, "Grounding requested but not supported by LiteLLM; ignoring");
        }

        let start = Instant::now();

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&build_body(request))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Provider(format!("HTTP {}: {}", status, body)));
        }

        let chat_response: ChatResponse = response.json().await?;
        let duration_ms = start.elapsed().as_millis() as u64;

        let text = chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|t| !t.trim().is_empty())
            .ok_or(ProviderError::EmptyResponse)?;

        let usage = chat_response.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(InferenceResponse {
            text,
            grounding: Vec::new(),
            usage,
            duration_ms: Some(duration_ms),
        })
    }

    async fn health_check(&self) -> HealthStatus {
        let url = format!("{}/health", self.base_url);
        let bearer = format!("Bearer {}", self.api_key);
        check_endpoint(&self.client, &url, ("Authorization", bearer.as_str())).await
    }
}
