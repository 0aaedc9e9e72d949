use crate::config::Config;
use crate::errors::AppError;
use crate::features::{extract_at, FEATURE_NAMES, FEATURE_SCHEMA_VERSION};
use crate::lead::{Lead, LeadField};
use crate::model::{Prediction, ScoringModel};
use crate::models::*;
use crate::scoring::proxy_breakdown;
use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::sync::Arc;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Trained model, absent until one has been produced by `train_model`.
    pub model: Option<Arc<ScoringModel>>,
}

impl AppState {
    pub fn new(config: Config, model: Option<ScoringModel>) -> Self {
        Self {
            config,
            model: model.map(Arc::new),
        }
    }
}

fn lead_id_of(lead: &Lead) -> Value {
    lead.field(LeadField::LeadId).cloned().unwrap_or(Value::Null)
}

/// Health check endpoint.
///
/// Reports whether a model is loaded so deployments can tell a scoring-capable
/// instance from a features-only one.
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    let model = state.model.as_ref().map(|model| {
        json!({
            "target": model.config().target,
            "objective": model.config().objective,
            "trees": model.booster().trees.len(),
            "trainedAt": model.config().trained_at,
        })
    });
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "lead-scoring",
            "version": env!("CARGO_PKG_VERSION"),
            "featureSchemaVersion": FEATURE_SCHEMA_VERSION,
            "modelLoaded": state.model.is_some(),
            "model": model,
        })),
    )
}

/// GET /api/v1/features/schema
pub async fn feature_schema() -> Json<SchemaResponse> {
    Json(SchemaResponse {
        feature_names: FEATURE_NAMES.iter().map(|name| name.to_string()).collect(),
        version: FEATURE_SCHEMA_VERSION.to_string(),
    })
}

/// POST /api/v1/leads/features
///
/// Extracts the feature vector for one lead or a batch, in input order.
pub async fn lead_features(
    Json(payload): Json<LeadPayload>,
) -> Result<Json<BatchResponse<FeatureRow>>, AppError> {
    let leads = payload.into_leads()?;
    tracing::debug!("Extracting features for {} leads", leads.len());

    Ok(Json(BatchResponse::new(feature_rows(&leads, Utc::now()))))
}

/// Feature rows for a batch, all relative to the same reference time.
fn feature_rows(leads: &[Lead], now: DateTime<Utc>) -> Vec<FeatureRow> {
    leads
        .iter()
        .map(|lead| FeatureRow::new(lead_id_of(lead), &extract_at(lead, now)))
        .collect()
}

/// POST /api/v1/leads/proxy-score
///
/// Rule-based completeness score with its per-factor breakdown.
pub async fn lead_proxy_score(
    Json(payload): Json<LeadPayload>,
) -> Result<Json<BatchResponse<ProxyScoreRow>>, AppError> {
    let leads = payload.into_leads()?;
    let rows = leads
        .iter()
        .map(|lead| ProxyScoreRow::new(lead_id_of(lead), proxy_breakdown(lead)))
        .collect();
    Ok(Json(BatchResponse::new(rows)))
}

/// POST /api/v1/leads/score
///
/// Scores leads with the loaded model. Returns 503 when no model is loaded.
pub async fn score_leads(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LeadPayload>,
) -> Result<Json<BatchResponse<Prediction>>, AppError> {
    let model = state.model.as_ref().ok_or_else(|| {
        AppError::ServiceUnavailable(format!(
            "no model loaded; train one into {}",
            state.config.model_dir.display()
        ))
    })?;

    let leads = payload.into_leads()?;
    let predictions = model.predict_leads(&leads);
    tracing::info!("Scored {} leads", predictions.len());
    Ok(Json(BatchResponse::new(predictions)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn feature_rows_share_one_reference_time() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap();
        let created = (now - Duration::days(5)).to_rfc3339();
        let leads: Vec<Lead> = (0..50)
            .map(|i| Lead::from_value(json!({"leadId": i, "createdAt": created})))
            .collect();

        let rows = feature_rows(&leads, now);
        assert_eq!(rows.len(), 50);
        assert!(rows.iter().all(|row| row.features["days_since_created"] == 5));
        assert_eq!(rows[49].lead_id, json!(49));
    }
}
