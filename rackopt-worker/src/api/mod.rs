//! API Module
//!
//! HTTP boundary of the worker: health check, the job request endpoint and
//! the metrics exposition.

pub mod error;
pub mod health;
pub mod metrics;
pub mod optimize;

use axum::{Router, middleware, routing::get};
use rackopt_io::Metrics;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::pipeline::Pipeline;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<dyn Pipeline>,
    pub metrics: Metrics,
}

/// Create the main API router with all endpoints
pub fn create_router(pipeline: Arc<dyn Pipeline>, metrics: Metrics) -> Router {
    Router::new()
        .route("/api/v1/health", get(health::health_check))
        .route(
            "/api/v1/optimize",
            get(optimize::optimize).post(optimize::optimize),
        )
        .route("/metrics", get(metrics::render))
        .route_layer(middleware::from_fn_with_state(
            metrics.clone(),
            metrics::track_requests,
        ))
        .with_state(AppState { pipeline, metrics })
        .layer(TraceLayer::new_for_http())
}
