use std::sync::Arc;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::{ApiErrorBody, FeaturesRequest, FeaturesResponse};
use tracing::{info, warn};

use crate::{
    services::features::{compute_features, validate_sequence},
    state::AppState,
};

pub async fn features_handler(
    State(state): State<AppState>,
    payload: Result<Json<FeaturesRequest>, JsonRejection>,
) -> Response {
    metrics::counter!("features_requests_total").increment(1);
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => return bad_request(rejection.body_text()),
    };
    let sequence = match validate_sequence(request.sequence, state.max_sequence_length) {
        Ok(sequence) => sequence,
        Err(reason) => return bad_request(reason),
    };

    let embedder = Arc::clone(&state.embedder);
    let job_sequence = sequence.clone();
    let outcome = match state
        .jobs
        .submit("features", state.limits, move |soft| {
            compute_features(&embedder, &job_sequence, soft)
        })
        .await
    {
        Ok(handle) => handle.wait().await,
        Err(err) => Err(err),
    };

    match outcome {
        Ok(features) => {
            metrics::counter!("features_jobs_total", "outcome" => "success").increment(1);
            info!(length = features.length, "features computed");
            (
                StatusCode::OK,
                Json(FeaturesResponse::merge(features, sequence)),
            )
                .into_response()
        }
        Err(err) => {
            metrics::counter!("features_jobs_total", "outcome" => "failure").increment(1);
            warn!(error = %err, "features job did not succeed");
            // Job failures have always been reported as 505; clients match on it.
            (
                StatusCode::HTTP_VERSION_NOT_SUPPORTED,
                Json(ApiErrorBody::new(err.to_string())),
            )
                .into_response()
        }
    }
}

fn bad_request(reason: impl Into<String>) -> Response {
    metrics::counter!("features_rejected_total").increment(1);
    (StatusCode::BAD_REQUEST, Json(ApiErrorBody::new(reason))).into_response()
}
