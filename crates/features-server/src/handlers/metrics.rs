use axum::{extract::State, response::IntoResponse};

use crate::state::AppState;

pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let jobs = state.jobs.metrics().snapshot();
    metrics::gauge!("features_jobs_submitted").set(jobs.submitted as f64);
    metrics::gauge!("features_jobs_expired").set(jobs.expired as f64);
    metrics::gauge!("features_jobs_timed_out").set(jobs.timed_out as f64);
    metrics::gauge!("features_job_avg_runtime_ms").set(jobs.avg_runtime_ms as f64);
    state.metrics.render()
}
