use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::errors::AppError;
use crate::features::FeatureVector;
use crate::lead::Lead;
use crate::scoring::{ProxyScore, ScoreBreakdown};

// ============ Input Payloads ============

/// Lead input: a single object or an array of objects.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum LeadPayload {
    Single(Map<String, Value>),
    Batch(Vec<Value>),
}

impl LeadPayload {
    /// Converts to leads for uniform processing. Every array element must be
    /// a JSON object.
    pub fn into_leads(self) -> Result<Vec<Lead>, AppError> {
        match self {
            LeadPayload::Single(map) => Ok(vec![Lead::new(map)]),
            LeadPayload::Batch(values) => values
                .into_iter()
                .enumerate()
                .map(|(idx, value)| match value {
                    Value::Object(map) => Ok(Lead::new(map)),
                    other => Err(AppError::BadRequest(format!(
                        "element {} is not a JSON object (got {})",
                        idx,
                        json_type(&other)
                    ))),
                })
                .collect(),
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============ API Response Models ============

/// Feature values of one lead, keyed by feature name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureRow {
    pub lead_id: Value,
    pub features: BTreeMap<String, i64>,
    /// Values in schema order.
    pub vector: Vec<i64>,
}

impl FeatureRow {
    pub fn new(lead_id: Value, features: &FeatureVector) -> Self {
        Self {
            lead_id,
            features: features
                .named()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
            vector: features.to_array().to_vec(),
        }
    }
}

/// Proxy score of one lead.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyScoreRow {
    pub lead_id: Value,
    /// Capped points, 0..=100.
    pub lead_score: u32,
    /// Normalized to `[0, 1]`.
    pub score: f64,
    pub reason: String,
    pub breakdown: ScoreBreakdown,
}

impl ProxyScoreRow {
    pub fn new(lead_id: Value, result: ProxyScore) -> Self {
        Self {
            lead_id,
            lead_score: result.points,
            score: result.score,
            reason: result.reason,
            breakdown: result.breakdown,
        }
    }
}

/// Feature schema exposed for producer/consumer agreement checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaResponse {
    pub feature_names: Vec<String>,
    pub version: String,
}

/// Generic batch response envelope.
#[derive(Debug, Clone, Serialize)]
pub struct BatchResponse<T> {
    pub count: usize,
    pub results: Vec<T>,
}

impl<T> BatchResponse<T> {
    pub fn new(results: Vec<T>) -> Self {
        Self {
            count: results.len(),
            results,
        }
    }
}
