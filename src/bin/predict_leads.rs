//! Scores leads from a JSON file with a trained model.
//!
//! Input is one lead object or an array of them. Output is a JSON array of
//! `{"leadId": ..., "probability": ...}` in input order.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use lead_scoring::model::{ScoringModel, MODEL_FILE};
use lead_scoring::obs;
use lead_scoring::sources::load_leads_from_json;

#[derive(Parser, Debug)]
#[command(name = "predict_leads")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Score leads with a trained lead conversion model", long_about = None)]
struct Args {
    /// JSON file with a lead object or an array of leads
    #[arg(short, long)]
    input: PathBuf,

    /// Trained model; `feature_config.json` must sit next to it
    #[arg(short, long, default_value_t = default_model_path())]
    model: String,

    /// Write predictions here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn default_model_path() -> String {
    format!("models/{}", MODEL_FILE)
}

fn main() -> Result<()> {
    let args = Args::parse();
    obs::init_tracing(obs::cli_directive(args.verbose));

    let model = ScoringModel::load(PathBuf::from(&args.model).as_path())
        .with_context(|| format!("Failed to load model {}", args.model))?;
    let leads = load_leads_from_json(&args.input)
        .with_context(|| format!("Failed to read leads from {}", args.input.display()))?;

    let predictions = model.predict_leads(&leads);
    let rendered = serde_json::to_string_pretty(&predictions)?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, rendered)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!("Wrote {} predictions to {}", predictions.len(), path.display());
        }
        None => println!("{}", rendered),
    }

    Ok(())
}
