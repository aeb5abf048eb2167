use axum::{Json, extract::State};
use common::{SchemaBundle, schema_bundle};
use dispatch::JobMetricsSnapshot;
use embeddings::{Device, EmbedderInterface};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub embedder: String,
    pub device: Device,
    pub runtime: &'static str,
    pub jobs: JobMetricsSnapshot,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    Json(HealthReport {
        status: if state.jobs.is_closed() { "degraded" } else { "ok" },
        embedder: state.embedder.name().to_string(),
        device: state.embedder.device(),
        runtime: state.embedder.runtime_name(),
        jobs: state.jobs.metrics().snapshot(),
    })
}

/// JSON schemas of the `/features` request, response and error bodies.
pub async fn schemas_handler() -> Json<SchemaBundle> {
    Json(schema_bundle())
}
