//! Lead scoring trainer CLI
//!
//! Loads leads from a CSV export or the Postgres lead table, builds the
//! training set, fits the boosted tree model and writes
//! `lead_score_model.json` plus `feature_config.json`.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use lead_scoring::config::Config;
use lead_scoring::dataset::{TargetMode, TargetSpec, TrainingSet, DEFAULT_TARGET_COLUMN};
use lead_scoring::db::{Database, LeadStore};
use lead_scoring::features::FEATURE_NAMES;
use lead_scoring::gbdt::{GbdtTrainer, Objective, TrainingParams};
use lead_scoring::lead::Lead;
use lead_scoring::metrics::{auc, log_loss};
use lead_scoring::model::ScoringModel;
use lead_scoring::obs;
use lead_scoring::sources::load_leads_from_csv;

#[derive(Parser, Debug)]
#[command(name = "train_model")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Train the lead conversion model", long_about = None)]
struct Args {
    /// Read leads from this CSV instead of the database
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Maximum leads read from the database (defaults to LEAD_LIMIT)
    #[arg(long)]
    limit: Option<i64>,

    /// Lead field holding the 0/1 conversion label
    #[arg(long, default_value = DEFAULT_TARGET_COLUMN)]
    target_column: String,

    /// `label` trains on recorded outcomes, `proxy` on the rule-based score
    #[arg(long, default_value = "label")]
    target_mode: TargetMode,

    /// Directory for the model and feature config (defaults to MODEL_DIR)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Fraction of leads held out for validation
    #[arg(long, default_value = "0.2")]
    test_size: f64,

    /// Seed for the train/validation split
    #[arg(long, default_value = "42")]
    random_state: u64,

    /// Number of boosting rounds
    #[arg(long, default_value = "500")]
    num_rounds: usize,

    #[arg(long, default_value = "0.05")]
    learning_rate: f64,

    #[arg(long, default_value = "6")]
    max_depth: usize,

    /// Minimum leads per leaf
    #[arg(long, default_value = "20")]
    min_samples_leaf: usize,

    /// Rounds without validation improvement before stopping (0 disables)
    #[arg(long, default_value = "50")]
    early_stopping_rounds: usize,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

async fn load_leads(args: &Args, config: &Config) -> Result<Vec<Lead>> {
    if let Some(path) = &args.csv {
        info!("Loading leads from CSV: {}", path.display());
        return Ok(load_leads_from_csv(path)?);
    }

    let database_url = config.require_database_url()?;
    let db = Database::new(database_url)
        .await
        .context("Failed to connect to the lead database")?;
    let store = LeadStore::new(db.pool.clone(), config.leads_table.clone())?;
    let limit = args.limit.unwrap_or(config.lead_limit);
    info!("Loading up to {} leads from table {}", limit, config.leads_table);
    Ok(store.fetch_leads(limit).await?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    obs::init_tracing(obs::cli_directive(args.verbose));

    let config = Config::from_env()?;
    let leads = load_leads(&args, &config).await?;
    info!("Loaded {} leads", leads.len());

    let target = match args.target_mode {
        TargetMode::Label => TargetSpec::label(args.target_column.clone()),
        TargetMode::Proxy => TargetSpec::proxy(),
    };
    info!("Target: {}", target.describe());

    let (dataset, summary) =
        TrainingSet::build(&leads, &target).context("Failed to build training set")?;
    info!(
        "Training set: {} of {} leads kept ({} dropped)",
        summary.kept, summary.input_leads, summary.dropped
    );

    let ranges = dataset.features.feature_ranges();
    info!("Feature statistics:");
    for (name, (min, max)) in FEATURE_NAMES.iter().zip(&ranges) {
        info!("  {}: min={}, max={}", name, min, max);
    }

    let (train, valid) = dataset.split(args.test_size, args.random_state);
    info!("Split: {} train, {} validation", train.len(), valid.len());

    let params = TrainingParams {
        num_rounds: args.num_rounds,
        learning_rate: args.learning_rate,
        max_depth: args.max_depth,
        min_samples_leaf: args.min_samples_leaf,
        early_stopping_rounds: args.early_stopping_rounds,
        ..TrainingParams::default()
    };
    let report = GbdtTrainer::new(params)
        .train(&train, Some(&valid))
        .context("Training failed")?;

    info!(
        "Trained {} rounds, kept {} (best iteration)",
        report.rounds_trained, report.best_iteration
    );
    if let Some((metric, value)) = report.validation {
        info!("Best validation {}: {:.4}", metric, value);
    }
    if !valid.is_empty() && report.booster.objective == Objective::Binary {
        let probabilities = report.booster.predict_matrix(&valid.features);
        match auc(&probabilities, &valid.targets) {
            Some(value) => info!("Validation AUC: {:.4}", value),
            None => info!("Validation AUC: undefined (single class in validation set)"),
        }
        info!(
            "Validation log loss: {:.4}",
            log_loss(&probabilities, &valid.targets)
        );
    }

    info!("Feature usage (split counts):");
    let counts = report.booster.split_counts();
    let mut usage: Vec<_> = FEATURE_NAMES.iter().zip(counts).collect();
    usage.sort_by(|a, b| b.1.cmp(&a.1));
    for (name, count) in usage {
        info!("  {}: {}", name, count);
    }

    let output_dir = args.output_dir.clone().unwrap_or(config.model_dir.clone());
    let mut model = ScoringModel::new(report.booster, target.describe());
    let (model_path, config_path) = model
        .save(&output_dir)
        .context("Failed to save model")?;
    info!("✓ Model saved to {}", model_path.display());
    info!("✓ Feature config saved to {}", config_path.display());

    Ok(())
}
