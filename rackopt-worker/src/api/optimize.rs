//! Optimize API Handler
//!
//! The body is parsed by hand so that an empty body, malformed JSON and a
//! missing filename each get their own response.

use axum::{Json, body::Bytes, extract::State};
use rackopt_core::dto::optimization::{OptimizationRequest, OptimizationResponse};
use tracing::debug;

use super::AppState;
use super::error::{ApiError, ApiResult};

/// GET|POST /api/v1/optimize
/// Runs one job for the archive named in the body
pub async fn optimize(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<OptimizationResponse>> {
    if body.is_empty() {
        return Err(ApiError::EmptyBody);
    }

    let request: OptimizationRequest =
        serde_json::from_slice(&body).map_err(ApiError::InvalidJson)?;

    let problems = request.validate();
    if !problems.is_empty() {
        return Err(ApiError::Validation(problems));
    }

    debug!("Optimization requested for '{}'", request.filename);
    let result = state.pipeline.execute(&request.filename).await?;

    Ok(Json(result.into()))
}
