//! Generative inference backends and the transport seam they share

mod gemini;
mod litellm;

pub use gemini::{DEFAULT_BASE_URL as GEMINI_BASE_URL, GeminiProvider};
pub use litellm::LiteLLMProvider;

use crate::ProviderConfig;
use crate::schema::Schema;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur when talking to an inference backend
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON serialization/deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Provider returned error: {0}")]
    Provider(String),

    #[error("Provider returned no content")]
    EmptyResponse,

    #[error("Prompt was blocked: {0}")]
    Blocked(String),

    #[error("Provider misconfigured: {0}")]
    Configuration(String),
}

/// A schema-constrained generation request
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    /// Backend model identifier
    pub model: String,

    /// Natural-language instructions
    pub prompt: String,

    /// Shape the JSON answer must take
    pub response_schema: Schema,

    /// Allow the backend to ground its answer with web search
    pub grounding: bool,

    /// Sampling temperature (0.0 - 2.0)
    pub temperature: Option<f32>,
}

impl InferenceRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>, response_schema: Schema) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            response_schema,
            grounding: false,
            temperature: None,
        }
    }

    pub fn with_grounding(mut self, grounding: bool) -> Self {
        self.grounding = grounding;
        self
    }

    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }
}

/// A web page the backend consulted while answering
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroundingChunk {
    pub title: Option<String>,
    pub uri: Option<String>,
}

/// Answer from an inference backend
#[derive(Debug, Clone, Default)]
pub struct InferenceResponse {
    /// The generated JSON text
    pub text: String,

    /// Grounding metadata, empty when the request was not grounded
    pub grounding: Vec<GroundingChunk>,

    /// Token usage statistics
    pub usage: Option<TokenUsage>,

    /// Time taken for generation (ms)
    pub duration_ms: Option<u64>,
}

/// Token usage statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Health status of a provider
#[derive(Debug, Clone)]
pub struct HealthStatus {
    pub healthy: bool,
    pub latency_ms: Option<u64>,
    pub error: Option<String>,
}

impl HealthStatus {
    fn from_status(status: reqwest::StatusCode, latency_ms: u64) -> Self {
        Self {
            healthy: status.is_success(),
            latency_ms: Some(latency_ms),
            error: (!status.is_success()).then(|| format!("HTTP {status}")),
        }
    }

    fn unreachable(error: impl std::fmt::Display) -> Self {
        Self {
            healthy: false,
            latency_ms: None,
            error: Some(error.to_string()),
        }
    }
}

/// Send an authenticated GET to `url` and report how the endpoint answered
pub(crate) async fn check_endpoint(
    client: &reqwest::Client,
    url: &str,
    auth: (&str, &str),
) -> HealthStatus {
    let start = Instant::now();
    let (header, value) = auth;
    match client.get(url).header(header, value).send().await {
        Ok(response) => {
            let status = response.status();
            debug!(url, status = %status, "Health check answered");
            HealthStatus::from_status(status, start.elapsed().as_millis() as u64)
        }
        Err(e) => HealthStatus::unreachable(e),
    }
}

/// Trait for inference backends
#[async_trait]
pub trait InferenceProvider: Send + Sync {
    /// Get the provider name for logging/identification
    fn name(&self) -> &str;

    /// Send a schema-constrained generation request
    async fn generate(&self, request: &InferenceRequest) -> Result<InferenceResponse, ProviderError>;

    /// Check if the provider is reachable and the credentials are accepted
    async fn health_check(&self) -> HealthStatus;
}

/// Build the configured backend
pub fn build_provider(config: &ProviderConfig) -> Result<Arc<dyn InferenceProvider>, ProviderError> {
    let api_key = config.resolve_api_key().ok_or_else(|| {
        ProviderError::Configuration(format!(
            "no API key found (set `api_key` in the config or the {} environment variable)",
            config.api_key_env
        ))
    })?;

    match config.provider_type.as_str() {
        "gemini" => {
            let provider = GeminiProvider::with_base_url(&config.base_url, api_key, config.timeout())?;
            info!(provider = "gemini", base_url = %config.base_url, "Configured Gemini provider");
            Ok(Arc::new(provider))
        }
        "litellm" => {
            let provider = LiteLLMProvider::with_base_url(&config.base_url, api_key, config.timeout())?;
            info!(provider = "litellm", base_url = %config.base_url, "Configured LiteLLM provider");
            Ok(Arc::new(provider))
        }
        other => Err(ProviderError::Configuration(format!(
            "unknown provider type '{other}' (expected \"gemini\" or \"litellm\")"
        ))),
    }
}
