use std::time::Instant;

use axum::{
    body::Body,
    http::{HeaderValue, Request, header::HeaderName},
    middleware::Next,
    response::Response,
};
use tracing::info;
use uuid::Uuid;

pub const X_CORRELATION_ID: &str = "x-correlation-id";

/// Tags every request with a correlation id, reusing one sent by the client.
pub async fn trace_with_correlation(mut req: Request<Body>, next: Next) -> Response {
    let started = Instant::now();
    let correlation = req
        .headers()
        .get(X_CORRELATION_ID)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map_or_else(|| Uuid::new_v4().to_string(), str::to_string);
    let header = HeaderValue::from_str(&correlation).ok();
    if let Some(value) = header.clone() {
        req.headers_mut()
            .insert(HeaderName::from_static(X_CORRELATION_ID), value);
    }

    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let mut res = next.run(req).await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    if let Some(value) = header {
        res.headers_mut()
            .insert(HeaderName::from_static(X_CORRELATION_ID), value);
    }
    metrics::histogram!("http_request_duration_ms", "path" => path.clone())
        .record(elapsed_ms as f64);

    info!(
        correlation_id = correlation,
        method = %method,
        path = %path,
        status = res.status().as_u16(),
        elapsed_ms,
        "request_complete"
    );
    res
}
