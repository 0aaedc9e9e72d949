use std::sync::Arc;

use lead_scoring::api;
use lead_scoring::config::Config;
use lead_scoring::errors::AppError;
use lead_scoring::handlers::AppState;
use lead_scoring::model::ScoringModel;
use lead_scoring::obs;

/// Main entry point for the scoring service.
///
/// Loads configuration and, when present, the trained model from
/// `MODEL_DIR`. Feature extraction and proxy scoring are served without a
/// model; `/api/v1/leads/score` answers 503 until one is available.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    obs::init_tracing("lead_scoring=info,tower_http=debug");

    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    let model_path = config.model_path();
    let model = match ScoringModel::load(&model_path) {
        Ok(model) => {
            tracing::info!("✓ Model loaded from {}", model_path.display());
            Some(model)
        }
        Err(AppError::NotFound(_)) => {
            tracing::warn!(
                "No model at {}; scoring endpoint disabled until train_model is run",
                model_path.display()
            );
            None
        }
        Err(e) => return Err(anyhow::anyhow!("failed to load model: {}", e)),
    };

    let app_state = Arc::new(AppState::new(config.clone(), model));
    let app = api::router(app_state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
