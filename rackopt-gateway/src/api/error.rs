//! API Error Handling

use axum::{
    Json,
    extract::multipart::{MultipartError, MultipartRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rackopt_client::ClientError;
use rackopt_core::dto::common::ErrorResponse;
use rackopt_io::StorageError;

/// API error type
#[derive(Debug)]
pub enum ApiError {
    NotMultipart(MultipartRejection),
    Multipart(MultipartError),
    InvalidFileName(String),
    NoFiles,
    InternalError(String),
    Storage(StorageError),
    Worker(ClientError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotMultipart(rejection) => {
                tracing::warn!("Rejected upload: {}", rejection);
                (StatusCode::BAD_REQUEST, "expected a multipart form".to_string())
            }
            ApiError::Multipart(err) => {
                tracing::warn!("Failed to read upload: {}", err);
                (err.status(), format!("error parsing file: {}", err.body_text()))
            }
            ApiError::InvalidFileName(name) => {
                (StatusCode::BAD_REQUEST, format!("invalid file name '{}'", name))
            }
            ApiError::NoFiles => (StatusCode::BAD_REQUEST, "no files were provided".to_string()),
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
            ApiError::Storage(err) => {
                tracing::error!("Storage error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "error uploading archive to the bucket".to_string(),
                )
            }
            ApiError::Worker(err) => {
                tracing::error!("Worker error: {}", err);
                (StatusCode::BAD_GATEWAY, "script execution error".to_string())
            }
        };

        (status, Json(ErrorResponse::new(message))).into_response()
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::Multipart(err)
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        ApiError::Storage(err)
    }
}

impl From<ClientError> for ApiError {
    fn from(err: ClientError) -> Self {
        ApiError::Worker(err)
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
