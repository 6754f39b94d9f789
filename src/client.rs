//! Typed inference client
//!
//! Each query is a small type implementing [`StructuredQuery`]: it knows its
//! prompt, its response schema and its output type. [`InferenceClient::execute`]
//! is the single transport path every query goes through.
//!
//! Failure policy differs per query. Suggestions fail soft (empty list, logged);
//! the spec lookup and the crash analysis fail hard because the run cannot
//! continue without them.

use crate::ModelConfig;
use crate::model::{
    AiModel, AnalysisResult, CrashParameters, ModelSuggestion, Severity, Source, VehicleSpecs,
};
use crate::prompt;
use crate::provider::{
    GroundingChunk, InferenceProvider, InferenceRequest, ProviderError, TokenUsage,
};
use crate::schema::{Schema, SchemaViolation};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Fewer characters than this never trigger a brand search
pub const MIN_BRAND_QUERY_CHARS: usize = 2;

const DEFAULT_SOURCE_TITLE: &str = "Safety Resource";
const DEFAULT_SOURCE_URI: &str = "#";

/// Errors from a structured inference call
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Response is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Response does not match the requested shape: {0}")]
    Schema(#[from] SchemaViolation),
}

/// A query with a schema-constrained JSON answer
pub trait StructuredQuery {
    type Output: DeserializeOwned;

    /// Short name for logs
    const NAME: &'static str;

    fn prompt(&self) -> String;

    fn schema() -> Schema;

    /// Whether the backend may ground the answer with web search
    fn grounded(&self) -> bool {
        false
    }
}

/// Manufacturer names matching a partial input
pub struct BrandSearch<'a> {
    pub partial: &'a str,
    pub limit: usize,
}

impl StructuredQuery for BrandSearch<'_> {
    type Output = Vec<String>;
    const NAME: &'static str = "brand_search";

    fn prompt(&self) -> String {
        prompt::brand_search(self.partial, self.limit)
    }

    fn schema() -> Schema {
        Schema::array(Schema::string())
    }
}

/// Popular series/models of a brand in a given year
pub struct ModelLookup<'a> {
    pub brand: &'a str,
    pub year: u16,
}

impl StructuredQuery for ModelLookup<'_> {
    type Output = Vec<ModelSuggestion>;
    const NAME: &'static str = "model_lookup";

    fn prompt(&self) -> String {
        prompt::model_lookup(self.brand, self.year)
    }

    fn schema() -> Schema {
        Schema::array(
            Schema::object([("series", Schema::string()), ("model", Schema::string())])
                .require(&["series", "model"]),
        )
    }
}

/// Physical and safety specifications of one vehicle
pub struct SpecLookup<'a> {
    pub brand: &'a str,
    pub model: &'a str,
    pub year: u16,
}

impl StructuredQuery for SpecLookup<'_> {
    type Output = VehicleSpecs;
    const NAME: &'static str = "spec_lookup";

    fn prompt(&self) -> String {
        prompt::spec_lookup(self.brand, self.model, self.year)
    }

    fn schema() -> Schema {
        Schema::object([
            ("brand", Schema::string()),
            ("series", Schema::string()),
            ("model", Schema::string()),
            ("year", Schema::integer().range(Some(1886.0), Some(f64::from(u16::MAX)))),
            ("weightKg", Schema::number().range(Some(0.0), None)),
            ("safetyRating", Schema::string()),
            ("safetyFeatures", Schema::array(Schema::string())),
        ])
        .require(&[
            "brand",
            "model",
            "year",
            "weightKg",
            "safetyRating",
            "safetyFeatures",
        ])
    }
}

/// Crash survivability and trauma analysis
pub struct CrashAnalysis<'a> {
    pub specs: &'a VehicleSpecs,
    pub params: &'a CrashParameters,
}

impl StructuredQuery for CrashAnalysis<'_> {
    type Output = AnalysisResult;
    const NAME: &'static str = "crash_analysis";

    fn prompt(&self) -> String {
        prompt::crash_analysis(self.specs, self.params)
    }

    fn schema() -> Schema {
        let percent = || Schema::number().range(Some(0.0), Some(100.0));
        let severity = Schema::string().one_of(Severity::ALL.iter().map(|s| s.label()));

        Schema::object([
            ("survivalProbability", percent()),
            ("estimatedGForce", Schema::number().range(Some(0.0), None)),
            ("kineticEnergyKJ", Schema::number().range(Some(0.0), None)),
            (
                "injuryRiskBreakdown",
                Schema::object([
                    ("head", Schema::string()),
                    ("chest", Schema::string()),
                    ("legs", Schema::string()),
                ])
                .require(&["head", "chest", "legs"]),
            ),
            (
                "specificInjuries",
                Schema::array(
                    Schema::object([
                        ("label", Schema::string()),
                        ("chance", percent()),
                        ("severity", severity),
                        ("description", Schema::string()),
                    ])
                    .require(&["label", "chance", "severity", "description"]),
                ),
            ),
            ("reasoning", Schema::string()),
        ])
        .require(&[
            "survivalProbability",
            "estimatedGForce",
            "kineticEnergyKJ",
            "injuryRiskBreakdown",
            "specificInjuries",
            "reasoning",
        ])
    }

    fn grounded(&self) -> bool {
        true
    }
}

/// A decoded answer plus the response metadata that travels outside the body
#[derive(Debug, Clone)]
pub struct Structured<T> {
    pub value: T,
    pub grounding: Vec<GroundingChunk>,
    pub usage: Option<TokenUsage>,
}

/// Client for the four inference queries
#[derive(Clone)]
pub struct InferenceClient {
    provider: Arc<dyn InferenceProvider>,
    models: ModelConfig,
    max_brand_suggestions: usize,
}

impl InferenceClient {
    pub fn new(
        provider: Arc<dyn InferenceProvider>,
        models: ModelConfig,
        max_brand_suggestions: usize,
    ) -> Self {
        Self {
            provider,
            models,
            max_brand_suggestions: max_brand_suggestions.max(1),
        }
    }

    pub fn provider(&self) -> &Arc<dyn InferenceProvider> {
        &self.provider
    }

    pub fn models(&self) -> &ModelConfig {
        &self.models
    }

    /// Send a query, check the answer against its schema, and decode it
    pub async fn execute<Q: StructuredQuery>(
        &self,
        query: &Q,
        model: &str,
    ) -> Result<Structured<Q::Output>, ClientError> {
        let request = InferenceRequest::new(model, query.prompt(), Q::schema())
            .with_grounding(query.grounded());

        debug!(
            query = Q::NAME,
            model,
            provider = self.provider.name(),
            prompt_len = request.prompt.len(),
            "Sending inference request"
        );

        let response = self.provider.generate(&request).await?;
        let value: Value = serde_json::from_str(strip_code_fence(&response.text))?;
        request.response_schema.validate(&value)?;
        let decoded = serde_json::from_value(value)?;

        info!(
            query = Q::NAME,
            model,
            duration_ms = ?response.duration_ms,
            total_tokens = ?response.usage.map(|u| u.total_tokens),
            "Inference request completed"
        );

        Ok(Structured {
            value: decoded,
            grounding: response.grounding,
            usage: response.usage,
        })
    }

    /// Up to `max_brand_suggestions` manufacturer names; empty on any failure
    pub async fn suggest_brands(&self, partial: &str) -> Vec<String> {
        if partial.chars().count() < MIN_BRAND_QUERY_CHARS {
            return Vec::new();
        }

        let query = BrandSearch {
            partial,
            limit: self.max_brand_suggestions,
        };
        match self.execute(&query, &self.models.fast).await {
            Ok(answer) => {
                let mut brands: Vec<String> = Vec::new();
                for name in answer.value {
                    let name = name.trim().to_string();
                    if !name.is_empty() && !brands.contains(&name) {
                        brands.push(name);
                    }
                }
                brands.truncate(self.max_brand_suggestions);
                brands
            }
            Err(e) => {
                warn!(error = %e, partial, "Brand suggestion failed");
                Vec::new()
            }
        }
    }

    /// Series/model pairs for a brand and year; empty on any failure
    pub async fn suggest_models(&self, brand: &str, year: u16) -> Vec<ModelSuggestion> {
        if brand.trim().is_empty() {
            return Vec::new();
        }

        let query = ModelLookup { brand, year };
        match self.execute(&query, &self.models.fast).await {
            Ok(answer) => answer.value,
            Err(e) => {
                warn!(error = %e, brand, year, "Model suggestion failed");
                Vec::new()
            }
        }
    }

    /// Resolve a vehicle identity to its specifications
    pub async fn fetch_vehicle_specs(
        &self,
        brand: &str,
        model: &str,
        year: u16,
    ) -> Result<VehicleSpecs, ClientError> {
        let query = SpecLookup { brand, model, year };
        let answer = self.execute(&query, &self.models.fast).await?;
        Ok(answer.value)
    }

    /// Run the crash analysis on the profile chosen by `selection`
    pub async fn run_crash_analysis(
        &self,
        specs: &VehicleSpecs,
        params: &CrashParameters,
        selection: AiModel,
    ) -> Result<AnalysisResult, ClientError> {
        let query = CrashAnalysis { specs, params };
        let model = self.models.for_analysis(selection);
        let answer = self.execute(&query, model).await?;

        let mut result = answer.value;
        result.sources = sources_from(&answer.grounding);

        let missing = result.missing_injury_categories();
        if !missing.is_empty() {
            warn!(?missing, "Analysis omitted required injury categories");
        }

        Ok(result)
    }
}

/// Convert grounding chunks into display sources, dropping exact duplicates
pub fn sources_from(chunks: &[GroundingChunk]) -> Vec<Source> {
    let mut sources: Vec<Source> = Vec::new();
    for chunk in chunks {
        let source = Source {
            title: chunk
                .title
                .clone()
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_SOURCE_TITLE.to_string()),
            uri: chunk
                .uri
                .clone()
                .filter(|u| !u.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_SOURCE_URI.to_string()),
        };
        if !sources.contains(&source) {
            sources.push(source);
        }
    }
    sources
}

/// Some backends wrap JSON mode output in a markdown fence anyway
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.strip_suffix("```").unwrap_or(body).trim()
}
