//! Metrics API Handler
//!
//! Request latency is labelled with the matched route template, so path
//! parameters never create new series.

use axum::{
    extract::{MatchedPath, Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use rackopt_io::{Metrics, metrics::CONTENT_TYPE};
use std::time::Instant;
use tracing::error;

use super::AppState;

/// GET /metrics
/// Prometheus text exposition
pub async fn render(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(text) => ([(header::CONTENT_TYPE, CONTENT_TYPE)], text).into_response(),
        Err(e) => {
            error!("Failed to render metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn track_requests(
    State(metrics): State<Metrics>,
    request: Request,
    next: Next,
) -> Response {
    let handler = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let method = request.method().to_string();

    let started = Instant::now();
    let response = next.run(request).await;
    metrics.observe_request(
        &handler,
        &method,
        response.status().as_u16(),
        started.elapsed(),
    );

    response
}
