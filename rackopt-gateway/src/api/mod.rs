//! API Module
//!
//! HTTP API layer for the gateway.

pub mod error;
pub mod health;
pub mod metrics;
pub mod upload;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};
use rackopt_client::OptimizationClient;
use rackopt_io::{ArchiveCodec, Metrics, StorageBackend};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn StorageBackend>,
    pub worker: OptimizationClient,
    pub archive: ArchiveCodec,
    /// Directory upload environments are created in
    pub env_base_dir: PathBuf,
    pub metrics: Metrics,
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState, max_upload_bytes: usize) -> Router {
    let metrics = state.metrics.clone();

    Router::new()
        .route("/api/v1/health", get(health::health_check))
        .route("/api/v1/upload", post(upload::upload))
        .route("/metrics", get(metrics::render))
        .route_layer(middleware::from_fn_with_state(
            metrics,
            metrics::track_requests,
        ))
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
}
