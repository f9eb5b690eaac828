//! Health Check API Handler

use axum::Json;
use rackopt_core::dto::common::HealthResponse;

/// GET /api/v1/health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
