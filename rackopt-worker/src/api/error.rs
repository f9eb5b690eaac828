//! API Error Handling
//!
//! Every error leaves the worker as `{"text": <message>}` with a fixed message
//! per failure class.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rackopt_core::domain::pipeline::PipelineError;
use rackopt_core::dto::common::ErrorResponse;

pub const EMPTY_BODY: &str = "empty request body";
pub const INVALID_JSON: &str = "error parsing json body";
pub const INVALID_REQUEST: &str = "error validating json body";
pub const DOWNLOAD_FAILED: &str = "failed to download files";
pub const SCRIPT_FAILED: &str = "script error";
pub const UPLOAD_FAILED: &str = "failed to upload the result";
pub const INTERNAL: &str = "internal error";

/// API error type
#[derive(Debug)]
pub enum ApiError {
    EmptyBody,
    InvalidJson(serde_json::Error),
    Validation(Vec<String>),
    Pipeline(PipelineError),
}

impl ApiError {
    /// Fixed message sent to the caller
    pub fn message(&self) -> &'static str {
        match self {
            ApiError::EmptyBody => EMPTY_BODY,
            ApiError::InvalidJson(_) => INVALID_JSON,
            ApiError::Validation(_) => INVALID_REQUEST,
            ApiError::Pipeline(kind) => pipeline_message(*kind),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::EmptyBody | ApiError::InvalidJson(_) | ApiError::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Pipeline(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Decompress and Compress share the generic message with the other internal kinds
fn pipeline_message(kind: PipelineError) -> &'static str {
    match kind {
        PipelineError::Download => DOWNLOAD_FAILED,
        PipelineError::Optimize => SCRIPT_FAILED,
        PipelineError::Upload => UPLOAD_FAILED,
        PipelineError::EnvironmentCreate
        | PipelineError::Decompress
        | PipelineError::Internal
        | PipelineError::Compress => INTERNAL,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::InvalidJson(err) => tracing::warn!("Malformed request body: {}", err),
            ApiError::Validation(problems) => {
                tracing::warn!("Invalid request: {}", problems.join(", "))
            }
            ApiError::Pipeline(kind) => tracing::error!("Job failed: {}", kind),
            ApiError::EmptyBody => {}
        }

        (self.status(), Json(ErrorResponse::new(self.message()))).into_response()
    }
}

impl From<PipelineError> for ApiError {
    fn from(kind: PipelineError) -> Self {
        ApiError::Pipeline(kind)
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
