//! Model artifacts and lead inference.
//!
//! A trained model is written as two sibling files that must be regenerated
//! together:
//!
//! - `lead_score_model.json`: the serialized [`Booster`].
//! - `feature_config.json`: the feature list the model was trained on, the
//!   target it predicts and a SHA-256 checksum of the model file.
//!
//! Loading refuses a model whose descriptor disagrees with
//! [`FEATURE_NAMES`] or whose checksum does not match.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::errors::{AppError, ResultExt};
use crate::features::{extract_batch_at, FEATURE_NAMES, FEATURE_SCHEMA_VERSION};
use crate::gbdt::{Booster, Objective};
use crate::lead::{Lead, LeadField};

pub const MODEL_FILE: &str = "lead_score_model.json";
pub const FEATURE_CONFIG_FILE: &str = "feature_config.json";

/// Descriptor stored next to the model file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureConfig {
    pub feature_names: Vec<String>,
    pub version: String,
    pub target: String,
    pub objective: Objective,
    pub prediction: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trained_at: Option<DateTime<Utc>>,
}

impl FeatureConfig {
    pub fn new(target: impl Into<String>, objective: Objective) -> Self {
        Self {
            feature_names: FEATURE_NAMES.iter().map(|name| name.to_string()).collect(),
            version: FEATURE_SCHEMA_VERSION.to_string(),
            target: target.into(),
            objective,
            prediction: match objective {
                Objective::Binary => "probability".to_string(),
                Objective::Regression => "score".to_string(),
            },
            model_sha256: None,
            trained_at: None,
        }
    }

    /// Fails unless the descriptor lists exactly [`FEATURE_NAMES`] in order.
    pub fn ensure_compatible(&self) -> Result<(), AppError> {
        if self.feature_names.iter().map(String::as_str).ne(FEATURE_NAMES) {
            return Err(AppError::ModelError(format!(
                "feature schema mismatch: model expects {:?}, extractor produces {:?}",
                self.feature_names, FEATURE_NAMES
            )));
        }
        if self.version != FEATURE_SCHEMA_VERSION {
            tracing::warn!(
                "Feature config version {} differs from extractor version {}",
                self.version,
                FEATURE_SCHEMA_VERSION
            );
        }
        Ok(())
    }
}

/// Probability re-attached to a lead identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub lead_id: Value,
    pub probability: f64,
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// A booster together with its descriptor.
#[derive(Debug, Clone)]
pub struct ScoringModel {
    booster: Booster,
    config: FeatureConfig,
}

impl ScoringModel {
    pub fn new(booster: Booster, target: impl Into<String>) -> Self {
        let config = FeatureConfig::new(target, booster.objective);
        Self { booster, config }
    }

    pub fn booster(&self) -> &Booster {
        &self.booster
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Writes the model and its descriptor into `dir`, creating it if needed.
    /// Returns `(model_path, config_path)`.
    pub fn save(&mut self, dir: &Path) -> Result<(PathBuf, PathBuf), AppError> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating output directory {}", dir.display()))?;

        let model_json = serde_json::to_string_pretty(&self.booster)
            .map_err(|e| AppError::ModelError(format!("serializing model: {}", e)))?;
        self.config.model_sha256 = Some(sha256_hex(model_json.as_bytes()));
        self.config.trained_at = Some(Utc::now());

        let model_path = dir.join(MODEL_FILE);
        std::fs::write(&model_path, &model_json)
            .with_context(|| format!("writing {}", model_path.display()))?;

        let config_json = serde_json::to_string_pretty(&self.config)
            .map_err(|e| AppError::ModelError(format!("serializing feature config: {}", e)))?;
        let config_path = dir.join(FEATURE_CONFIG_FILE);
        std::fs::write(&config_path, config_json)
            .with_context(|| format!("writing {}", config_path.display()))?;

        Ok((model_path, config_path))
    }

    /// Loads a model file and the `feature_config.json` next to it.
    pub fn load(model_path: &Path) -> Result<Self, AppError> {
        if !model_path.exists() {
            return Err(AppError::NotFound(format!(
                "model not found at {}",
                model_path.display()
            )));
        }
        let model_json = std::fs::read_to_string(model_path)
            .with_context(|| format!("reading {}", model_path.display()))?;

        let config_path = model_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(FEATURE_CONFIG_FILE);
        let config_json = std::fs::read_to_string(&config_path)
            .with_context(|| format!("reading {}", config_path.display()))?;
        let config: FeatureConfig = serde_json::from_str(&config_json)
            .map_err(|e| AppError::ModelError(format!("parsing feature config: {}", e)))?;
        config.ensure_compatible()?;

        if let Some(expected) = &config.model_sha256 {
            let actual = sha256_hex(model_json.as_bytes());
            if &actual != expected {
                return Err(AppError::ModelError(format!(
                    "model checksum mismatch: expected {}, got {}",
                    expected, actual
                )));
            }
        }

        let booster: Booster = serde_json::from_str(&model_json)
            .map_err(|e| AppError::ModelError(format!("parsing model: {}", e)))?;
        booster.validate()?;
        if booster.objective != config.objective {
            return Err(AppError::ModelError(format!(
                "objective mismatch: model is {:?}, feature config says {:?}",
                booster.objective, config.objective
            )));
        }

        tracing::info!(
            "Loaded model {} ({} trees, target '{}')",
            model_path.display(),
            booster.trees.len(),
            config.target
        );
        Ok(Self { booster, config })
    }

    /// Scores leads relative to the current wall clock.
    pub fn predict_leads(&self, leads: &[Lead]) -> Vec<Prediction> {
        self.predict_leads_at(leads, Utc::now())
    }

    /// One prediction per lead, in input order. No thresholding is applied.
    pub fn predict_leads_at(&self, leads: &[Lead], now: DateTime<Utc>) -> Vec<Prediction> {
        let matrix = extract_batch_at(leads, now);
        leads
            .iter()
            .zip(self.booster.predict_matrix(&matrix))
            .map(|(lead, probability)| Prediction {
                lead_id: lead.field(LeadField::LeadId).cloned().unwrap_or(Value::Null),
                probability,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gbdt::{Node, Tree};
    use crate::features::FEATURE_COUNT;
    use serde_json::json;
    use tempfile::tempdir;

    /// Email present -> raw +2, otherwise -2.
    fn email_booster() -> Booster {
        Booster {
            objective: Objective::Binary,
            base_score: 0.0,
            feature_count: FEATURE_COUNT,
            trees: vec![Tree {
                nodes: vec![
                    Node::Split {
                        feature: 0,
                        threshold: 0,
                        left: 1,
                        right: 2,
                    },
                    Node::Leaf { value: -2.0 },
                    Node::Leaf { value: 2.0 },
                ],
            }],
        }
    }

    #[test]
    fn save_then_load() {
        let dir = tempdir().unwrap();
        let mut model = ScoringModel::new(email_booster(), "converted");
        let (model_path, config_path) = model.save(dir.path()).unwrap();

        assert!(config_path.ends_with(FEATURE_CONFIG_FILE));
        let loaded = ScoringModel::load(&model_path).unwrap();
        assert_eq!(loaded.booster(), model.booster());
        assert_eq!(loaded.config().target, "converted");
        assert_eq!(loaded.config().prediction, "probability");
        assert_eq!(loaded.config().feature_names.len(), FEATURE_COUNT);
    }

    #[test]
    fn tampered_model_is_rejected() {
        let dir = tempdir().unwrap();
        let mut model = ScoringModel::new(email_booster(), "converted");
        let (model_path, _) = model.save(dir.path()).unwrap();

        let tampered = std::fs::read_to_string(&model_path)
            .unwrap()
            .replace("2.0", "3.0");
        std::fs::write(&model_path, tampered).unwrap();

        let err = ScoringModel::load(&model_path).unwrap_err();
        assert!(matches!(err, AppError::ModelError(msg) if msg.contains("checksum")));
    }

    #[test]
    fn reordered_feature_config_is_rejected() {
        let dir = tempdir().unwrap();
        let mut model = ScoringModel::new(email_booster(), "converted");
        let (model_path, config_path) = model.save(dir.path()).unwrap();

        let mut config: FeatureConfig =
            serde_json::from_str(&std::fs::read_to_string(&config_path).unwrap()).unwrap();
        config.feature_names.swap(0, 1);
        std::fs::write(&config_path, serde_json::to_string(&config).unwrap()).unwrap();

        assert!(matches!(
            ScoringModel::load(&model_path),
            Err(AppError::ModelError(msg)) if msg.contains("schema mismatch")
        ));
    }

    #[test]
    fn missing_model_is_not_found() {
        let dir = tempdir().unwrap();
        let result = ScoringModel::load(&dir.path().join(MODEL_FILE));
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[test]
    fn predictions_keep_order_and_ids() {
        let model = ScoringModel::new(email_booster(), "converted");
        let leads = vec![
            Lead::from_value(json!({"leadId": "A", "email": "a@x.io"})),
            Lead::from_value(json!({"lead_id": 7})),
            Lead::from_value(json!({"email": "c@x.io"})),
        ];
        let predictions = model.predict_leads(&leads);

        assert_eq!(predictions.len(), 3);
        assert_eq!(predictions[0].lead_id, json!("A"));
        assert_eq!(predictions[1].lead_id, json!(7));
        assert_eq!(predictions[2].lead_id, Value::Null);
        assert!(predictions[0].probability > 0.88);
        assert!(predictions[1].probability < 0.12);

        let encoded = serde_json::to_value(&predictions[0]).unwrap();
        assert!(encoded.get("leadId").is_some());
    }

    #[test]
    fn empty_lead_id_does_not_fall_back_to_snake_case() {
        let model = ScoringModel::new(email_booster(), "converted");
        let leads = vec![
            Lead::from_value(json!({"leadId": "", "lead_id": "L-9"})),
            Lead::from_value(json!({"leadId": null, "lead_id": "L-9"})),
        ];
        let predictions = model.predict_leads(&leads);
        assert_eq!(predictions[0].lead_id, json!(""));
        assert_eq!(predictions[1].lead_id, json!("L-9"));
    }
}
