//! Prediction and attribution models

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::schema::InputValue;

/// Baseline plus one signed contribution per feature, in schema order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribution {
    pub expected_value: f64,
    pub contributions: Vec<f64>,
}

impl Attribution {
    /// `expected_value + Σ contributions`, which equals the model output
    pub fn reconstructed(&self) -> f64 {
        self.expected_value + self.contributions.iter().sum::<f64>()
    }
}

/// One feature's share of the prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureContribution {
    pub feature: String,
    pub value: f64,
    pub contribution: f64,
}

/// Result of the predict-and-explain action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Explanation {
    pub id: Uuid,
    pub prediction: f64,
    pub expected_value: f64,
    pub contributions: Vec<FeatureContribution>,
    pub layout_hash: u32,
    pub created_at: DateTime<Utc>,
}

impl Explanation {
    /// Contributions ordered by absolute size, largest first
    pub fn by_magnitude(&self) -> Vec<&FeatureContribution> {
        let mut sorted: Vec<_> = self.contributions.iter().collect();
        sorted.sort_by(|a, b| b.contribution.abs().total_cmp(&a.contribution.abs()));
        sorted
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct PredictRequest {
    /// Feature name → submitted value; missing features use their default
    #[serde(default)]
    #[validate(length(max = 512))]
    pub values: HashMap<String, InputValue>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    #[serde(flatten)]
    pub explanation: Explanation,
    /// Features whose submitted value was clamped into range
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clamped: Vec<String>,
}
