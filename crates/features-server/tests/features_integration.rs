use std::time::Duration;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use dispatch::{JobLimits, spawn_job_worker};
use features_server::{app, state::AppState};
use serde_json::json;
use tower::ServiceExt;

fn features_request(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/features")
        .header("content-type", "application/json")
        .body(body.into())
        .expect("request")
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let res = app.oneshot(req).await.expect("response");
    let status = res.status();
    let body = to_bytes(res.into_body(), usize::MAX).await.expect("bytes");
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

#[tokio::test]
async fn features_returns_reduced_embedding_merged_with_sequence() {
    let (state, receiver) = AppState::for_tests();
    let _worker = spawn_job_worker(receiver);

    let (status, json) = send(
        app::router(state),
        features_request(json!({ "sequence": "PROTEIN" }).to_string()),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["sequence"], "PROTEIN");
    assert_eq!(json["embedder"], "seqvec");
    assert_eq!(json["length"], 7);
    assert_eq!(json["embedding_dimension"], 1024);
    assert_eq!(
        json["per_protein"].as_array().expect("per_protein array").len(),
        1024
    );
}

#[tokio::test]
async fn overlong_sequence_is_rejected_without_submitting_a_job() {
    let (state, receiver) = AppState::for_tests();
    let _worker = spawn_job_worker(receiver);
    let metrics = state.jobs.metrics();

    let (status, json) = send(
        app::router(state),
        features_request(json!({ "sequence": "A".repeat(2001) }).to_string()),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().expect("error message").contains("2000"));
    assert_eq!(metrics.snapshot().submitted, 0);
}

#[tokio::test]
async fn body_over_the_size_limit_is_a_bad_request() {
    let (state, receiver) = AppState::for_tests();
    let _worker = spawn_job_worker(receiver);
    let metrics = state.jobs.metrics();
    let body = json!({ "sequence": "A".repeat(70_000) }).to_string();
    let req = Request::builder()
        .method("POST")
        .uri("/features")
        .header("content-type", "application/json")
        .header("content-length", body.len())
        .body(Body::from(body))
        .expect("request");

    let (status, json) = send(app::router(state), req).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].is_string());
    assert_eq!(metrics.snapshot().submitted, 0);
}

#[tokio::test]
async fn invalid_bodies_are_bad_requests() {
    let (state, _receiver) = AppState::for_tests();
    let metrics = state.jobs.metrics();

    for body in [
        json!({ "sequence": "PROT EIN" }).to_string(),
        json!({ "sequence": "protein" }).to_string(),
        json!({ "sequence": "" }).to_string(),
        json!({}).to_string(),
        "{\"sequence\": ".to_string(),
    ] {
        let (status, json) = send(app::router(state.clone()), features_request(body.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body {body}");
        assert!(json["error"].is_string(), "body {body}");
    }
    assert_eq!(metrics.snapshot().submitted, 0);
}

#[tokio::test]
async fn expired_job_is_reported_as_505() {
    let (mut state, _receiver) = AppState::for_tests();
    state.limits = JobLimits::new(
        Duration::from_secs(1),
        Duration::from_secs(1),
        Duration::from_millis(50),
    )
    .expect("limits");

    let (status, json) = send(
        app::router(state),
        features_request(json!({ "sequence": "SEQWENCE" }).to_string()),
    )
    .await;

    assert_eq!(status.as_u16(), 505);
    assert!(json["error"].as_str().expect("error message").contains("expired"));
}

#[tokio::test]
async fn health_reports_embedder_and_job_counters() {
    let (state, _receiver) = AppState::for_tests();
    let req = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .expect("request");

    let (status, json) = send(app::router(state), req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["embedder"], "seqvec");
    assert_eq!(json["runtime"], "synthetic");
    assert_eq!(json["jobs"]["submitted"], 0);
}

#[tokio::test]
async fn schemas_describe_request_and_response() {
    let (state, _receiver) = AppState::for_tests();
    let req = Request::builder()
        .uri("/schemas")
        .body(Body::empty())
        .expect("request");

    let (status, json) = send(app::router(state), req).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["features_request"].is_object());
    assert!(json["features_response"].is_object());
    assert!(json["error"].is_object());
}

#[tokio::test]
async fn correlation_id_is_echoed() {
    let (state, _receiver) = AppState::for_tests();
    let req = Request::builder()
        .uri("/health")
        .header("x-correlation-id", "req-123")
        .body(Body::empty())
        .expect("request");

    let res = app::router(state).oneshot(req).await.expect("response");
    assert_eq!(
        res.headers()
            .get("x-correlation-id")
            .and_then(|value| value.to_str().ok()),
        Some("req-123")
    );
}
