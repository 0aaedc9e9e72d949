/// End-to-end training tests
/// CSV export -> training set -> boosted trees -> saved model -> predictions
use lead_scoring::dataset::{TargetSpec, TrainingSet};
use lead_scoring::errors::AppError;
use lead_scoring::gbdt::{GbdtTrainer, Objective, TrainingParams};
use lead_scoring::metrics::auc;
use lead_scoring::model::{ScoringModel, FEATURE_CONFIG_FILE};
use lead_scoring::sources::{load_leads_from_csv, load_leads_from_json};
use serde_json::json;
use std::io::Write;
use tempfile::{tempdir, NamedTempFile};

/// Helper: CSV where conversion follows email presence, with a little noise
fn write_training_csv(rows: usize) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "lead_id,email,phone,p_id,created_at,converted").unwrap();
    for i in 0..rows {
        let has_email = i % 2 == 0;
        let email = if has_email { format!("lead{}@mail.io", i) } else { String::new() };
        let phone = if i % 3 == 0 { "9876500000" } else { "" };
        let p_id = ["PERSONAL_LOAN", "CREDIT_CARD", "HOME", "GOLD"][i % 4];
        // Every tenth lead flips its label
        let converted = if (i % 10 == 9) != has_email { "yes" } else { "no" };
        writeln!(
            file,
            "L{},{},{},{},2024-01-{:02}T00:00:00Z,{}",
            i,
            email,
            phone,
            p_id,
            1 + i % 28,
            converted
        )
        .unwrap();
    }
    file
}

fn small_params() -> TrainingParams {
    TrainingParams {
        num_rounds: 60,
        learning_rate: 0.2,
        max_depth: 3,
        min_samples_leaf: 5,
        early_stopping_rounds: 20,
        log_period: 0,
        ..TrainingParams::default()
    }
}

#[test]
fn test_csv_to_predictions() {
    let csv = write_training_csv(200);
    let leads = load_leads_from_csv(csv.path()).unwrap();
    assert_eq!(leads.len(), 200);

    let (dataset, summary) = TrainingSet::build(&leads, &TargetSpec::default()).unwrap();
    assert_eq!(summary.kept, 200);
    assert_eq!(summary.dropped, 0);

    let (train, valid) = dataset.split(0.25, 42);
    assert_eq!(train.len() + valid.len(), 200);

    let report = GbdtTrainer::new(small_params())
        .train(&train, Some(&valid))
        .unwrap();
    assert_eq!(report.booster.objective, Objective::Binary);
    let (metric, value) = report.validation.unwrap();
    assert_eq!(metric, "auc");
    assert!(value > 0.8, "validation auc {}", value);

    let dir = tempdir().unwrap();
    let mut model = ScoringModel::new(report.booster, "converted");
    let (model_path, config_path) = model.save(dir.path()).unwrap();
    assert!(config_path.ends_with(FEATURE_CONFIG_FILE));

    let loaded = ScoringModel::load(&model_path).unwrap();
    let predictions = loaded.predict_leads(&leads);
    assert_eq!(predictions.len(), leads.len());
    assert_eq!(predictions[0].lead_id, json!("L0"));
    assert!(predictions
        .iter()
        .all(|p| (0.0..=1.0).contains(&p.probability)));

    let scores: Vec<f64> = predictions.iter().map(|p| p.probability).collect();
    let labels: Vec<f64> = leads
        .iter()
        .map(|lead| match lead.as_map().get("converted") {
            Some(v) if v == "yes" => 1.0,
            _ => 0.0,
        })
        .collect();
    assert!(auc(&scores, &labels).unwrap() > 0.8);
}

#[test]
fn test_proxy_target_trains_regression() {
    let csv = write_training_csv(120);
    let leads = load_leads_from_csv(csv.path()).unwrap();

    let (dataset, _) = TrainingSet::build(&leads, &TargetSpec::proxy()).unwrap();
    let (train, valid) = dataset.split(0.2, 7);
    let report = GbdtTrainer::new(small_params())
        .train(&train, Some(&valid))
        .unwrap();

    assert_eq!(report.booster.objective, Objective::Regression);
    assert_eq!(report.validation.unwrap().0, "rmse");

    let dir = tempdir().unwrap();
    let mut model = ScoringModel::new(report.booster, TargetSpec::proxy().describe());
    let (model_path, _) = model.save(dir.path()).unwrap();
    let loaded = ScoringModel::load(&model_path).unwrap();
    assert_eq!(loaded.config().prediction, "score");
    assert_eq!(loaded.config().target, "proxy_score");
}

#[test]
fn test_missing_target_column_is_fatal() {
    let csv = write_training_csv(20);
    let leads = load_leads_from_csv(csv.path()).unwrap();
    let result = TrainingSet::build(&leads, &TargetSpec::label("purchased"));
    assert!(matches!(result, Err(AppError::InvalidDataset(msg)) if msg.contains("purchased")));
}

#[test]
fn test_split_is_reproducible() {
    let csv = write_training_csv(100);
    let leads = load_leads_from_csv(csv.path()).unwrap();
    let (dataset, _) = TrainingSet::build(&leads, &TargetSpec::default()).unwrap();

    let first = dataset.split(0.2, 42);
    let second = dataset.split(0.2, 42);
    assert_eq!(first, second);
}

#[test]
fn test_prediction_input_from_json_file() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", json!([{"leadId": "X"}, {"leadId": "Y", "email": "y@z.io"}])).unwrap();
    let leads = load_leads_from_json(file.path()).unwrap();
    assert_eq!(leads.len(), 2);
}
