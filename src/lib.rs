//! AeroSafety - crash survivability simulation backed by a generative model
//!
//! This crate provides:
//! - Schema-constrained inference backends (Gemini, LiteLLM proxy)
//! - A typed inference client for brand/model suggestions, spec lookup and crash analysis
//! - The simulation run state machine with a display-only progress schedule
//! - Debounced autocomplete with dropdown hit-testing
//! - Terminal rendering of analysis results
//!
//! Kinetic energy, G-force and injury likelihoods all come from the remote
//! model; nothing here simulates physics locally.

pub mod autocomplete;
pub mod client;
pub mod model;
pub mod prompt;
pub mod provider;
pub mod render;
pub mod schema;
pub mod simulation;

#[cfg(test)]
mod scenario_tests;
#[cfg(test)]
mod testing;

pub use autocomplete::AutocompleteController;
pub use client::{ClientError, InferenceClient};
pub use model::{AnalysisResult, CrashParameters, RunState, Settings, VehicleIdentity, VehicleSpecs};
pub use provider::{InferenceProvider, InferenceRequest, InferenceResponse};
pub use simulation::{Simulation, SimulationController};

use model::AiModel;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors loading or validating configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration for the whole application.
///
/// Every section has defaults, so an empty file is a valid configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Inference backend
    pub provider: ProviderConfig,

    /// Backend model identifiers per profile
    pub models: ModelConfig,

    /// Suggestion behaviour
    pub autocomplete: AutocompleteConfig,

    /// Initial user settings
    pub settings: Settings,

    /// Initial vehicle identity
    pub vehicle: VehicleIdentity,
}

impl AppConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.autocomplete.debounce_ms == 0 {
            return Err(ConfigError::Invalid("autocomplete.debounce_ms must be positive".to_string()));
        }
        if self.autocomplete.max_brand_suggestions == 0 {
            return Err(ConfigError::Invalid(
                "autocomplete.max_brand_suggestions must be positive".to_string(),
            ));
        }
        if self.models.fast.trim().is_empty() || self.models.detailed.trim().is_empty() {
            return Err(ConfigError::Invalid("model identifiers must not be empty".to_string()));
        }
        self.settings
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("settings: {e}")))?;
        Ok(())
    }
}

/// Configuration for the inference backend
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Provider type: "gemini" or "litellm"
    pub provider_type: String,

    /// Base URL for the provider
    pub base_url: String,

    /// API key; takes precedence over the environment
    pub api_key: Option<String>,

    /// Environment variable holding the API key
    pub api_key_env: String,

    /// Secondary environment variable consulted when `api_key_env` is unset
    pub fallback_api_key_env: Option<String>,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider_type: "gemini".to_string(),
            base_url: provider::GEMINI_BASE_URL.to_string(),
            api_key: None,
            api_key_env: "GEMINI_API_KEY".to_string(),
            fallback_api_key_env: Some("API_KEY".to_string()),
            timeout_secs: 120,
        }
    }
}

impl ProviderConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(&self.api_key_env).ok())
            .or_else(|| {
                self.fallback_api_key_env
                    .as_ref()
                    .and_then(|var| std::env::var(var).ok())
            })
            .filter(|k| !k.trim().is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// Backend model identifiers for the two profiles
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Fast/light profile: suggestions, spec lookup, and analysis when selected
    pub fast: String,

    /// Detailed/slow profile: analysis only
    pub detailed: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            fast: "gemini-3-flash-preview".to_string(),
            detailed: "gemini-3-pro-preview".to_string(),
        }
    }
}

impl ModelConfig {
    /// Model identifier that handles the crash analysis for a selection
    pub fn for_analysis(&self, selection: AiModel) -> &str {
        match selection {
            AiModel::Detailed => &self.detailed,
            AiModel::Fast => &self.fast,
        }
    }
}

/// Configuration for brand/model suggestions
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AutocompleteConfig {
    /// Quiet period after the last keystroke before brands are searched
    pub debounce_ms: u64,

    /// Upper bound on returned brand names
    pub max_brand_suggestions: usize,
}

impl Default for AutocompleteConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 500,
            max_brand_suggestions: 5,
        }
    }
}

impl AutocompleteConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}
