//! HTTP surface: route table and middleware.

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::handlers::{self, AppState};

/// Maximum accepted request body (5MB).
pub const MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

/// Builds the application router over the given state.
pub fn router(state: Arc<AppState>) -> Router {
    let lead_routes = Router::new()
        .route("/api/v1/features/schema", get(handlers::feature_schema))
        .route("/api/v1/leads/features", post(handlers::lead_features))
        .route("/api/v1/leads/proxy-score", post(handlers::lead_proxy_score))
        .route("/api/v1/leads/score", post(handlers::score_leads))
        .layer(
            ServiceBuilder::new()
                // Json defaults to 2MB; the tower layer owns the cap
                .layer(DefaultBodyLimit::disable())
                .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES)),
        );

    Router::new()
        .route("/health", get(handlers::health))
        .merge(lead_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
