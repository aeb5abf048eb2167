use axum::middleware;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

use crate::handlers::{
    features::features_handler,
    health::{health, schemas_handler},
    metrics::metrics_handler,
};
use crate::middleware::trace_with_correlation;
use crate::state::AppState;

/// Sequences are capped well below this. An oversized body fails JSON
/// extraction, which the features handler answers with 400.
const MAX_BODY_BYTES: usize = 64 * 1024;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/features", post(features_handler))
        .route("/health", get(health))
        .route("/metrics", get(metrics_handler))
        .route("/schemas", get(schemas_handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(middleware::from_fn(trace_with_correlation))
        .with_state(state)
}
