use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Body returned by `POST /predict` on success.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PredictionResponse {
    pub success: bool,
    pub plant_type: String,
    pub disease: String,
    /// Percentage in `0..=100`, rounded to two decimals.
    pub confidence: f64,
    #[serde(rename = "class")]
    pub class_name: String,
    pub all_probabilities: BTreeMap<String, f64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Healthy,
    Degraded,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct HealthResponse {
    pub status: ServiceStatus,
    pub model_loaded: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ErrorResponse {
    pub success: bool,
    pub detail: String,
}

impl ErrorResponse {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            success: false,
            detail: detail.into(),
        }
    }
}
