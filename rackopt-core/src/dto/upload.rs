//! Upload DTOs returned by the gateway

use serde::{Deserialize, Serialize};

use crate::dto::optimization::OptimizationResponse;

/// Location of the optimization result handed back to the uploader
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub filename: String,
    pub location: String,
    pub etag: String,
}

impl From<OptimizationResponse> for UploadResponse {
    fn from(response: OptimizationResponse) -> Self {
        Self {
            filename: response.filename,
            location: response.location,
            etag: response.etag,
        }
    }
}
