//! Test doubles shared by unit and scenario tests

use crate::InferenceClient;
use crate::ModelConfig;
use crate::provider::{
    GroundingChunk, HealthStatus, InferenceProvider, InferenceRequest, InferenceResponse,
    ProviderError,
};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

enum Reply {
    Text(String, Vec<GroundingChunk>),
    Fail(String),
}

/// Provider that answers from a queue of canned replies and records every
/// request it sees.
#[derive(Default)]
pub(crate) struct ScriptedProvider {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<InferenceRequest>>,
    gate: Option<Arc<Notify>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every call until the gate is notified once per call
    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn push_json(&self, value: Value) {
        self.push_text(&value.to_string());
    }

    pub fn push_text(&self, text: &str) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Reply::Text(text.to_string(), Vec::new()));
    }

    pub fn push_grounded(&self, value: Value, chunks: Vec<GroundingChunk>) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Reply::Text(value.to_string(), chunks));
    }

    pub fn push_failure(&self, message: &str) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Reply::Fail(message.to_string()));
    }

    pub fn requests(&self) -> Vec<InferenceRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl InferenceProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: &InferenceRequest) -> Result<InferenceResponse, ProviderError> {
        self.requests.lock().unwrap().push(request.clone());

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Text(text, grounding)) => Ok(InferenceResponse {
                text,
                grounding,
                usage: None,
                duration_ms: Some(1),
            }),
            Some(Reply::Fail(message)) => Err(ProviderError::Provider(message)),
            None => Err(ProviderError::Provider("no scripted reply left".to_string())),
        }
    }

    async fn health_check(&self) -> HealthStatus {
        HealthStatus {
            healthy: true,
            latency_ms: Some(0),
            error: None,
        }
    }
}

pub(crate) fn client_for(provider: &Arc<ScriptedProvider>) -> InferenceClient {
    InferenceClient::new(provider.clone(), ModelConfig::default(), 5)
}

pub(crate) fn tesla_specs_json() -> Value {
    json!({
        "brand": "Tesla",
        "series": "Highland",
        "model": "Model 3",
        "year": 2023,
        "weightKg": 1844,
        "safetyRating": "5 Stars Euro NCAP",
        "safetyFeatures": ["Automatic Emergency Braking", "8 Airbags", "Lane Keep Assist"]
    })
}

pub(crate) fn analysis_json() -> Value {
    json!({
        "survivalProbability": 94,
        "estimatedGForce": 32.5,
        "kineticEnergyKJ": 256.1,
        "injuryRiskBreakdown": {
            "head": "Low - airbag and belt limit head excursion",
            "chest": "Moderate - belt loading",
            "legs": "Low"
        },
        "specificInjuries": [
            {"label": "Concussion (MTBI)", "chance": 22, "severity": "Moderate", "description": "Rapid deceleration of the head."},
            {"label": "Traumatic Brain Injury", "chance": 6, "severity": "High", "description": "Unlikely with optimal airbag deployment."},
            {"label": "Bone Fractures", "chance": 18, "severity": "Moderate", "description": "Clavicle and sternum from belt load."},
            {"label": "Internal Organ Damage", "chance": 9, "severity": "Critical", "description": "Seatbelt syndrome risk."}
        ],
        "reasoning": "At 60 km/h a 1844 kg vehicle carries roughly 256 kJ."
    })
}
