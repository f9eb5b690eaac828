//! Optimization DTOs

use serde::{Deserialize, Serialize};

use crate::domain::pipeline::PipelineResult;

/// Request to optimize an archive already present in the bucket
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizationRequest {
    #[serde(default)]
    pub filename: String,
}

impl OptimizationRequest {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
        }
    }

    /// Returns the list of validation problems, empty when the request is usable
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.filename.is_empty() {
            errors.push("filename: not set".to_string());
        }
        errors
    }
}

/// Successful optimization result
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizationResponse {
    pub filename: String,
    pub location: String,
    pub etag: String,
    /// Script run time in whole milliseconds
    #[serde(rename = "executionTime")]
    pub execution_time: u64,
}

impl From<PipelineResult> for OptimizationResponse {
    fn from(result: PipelineResult) -> Self {
        Self {
            filename: result.filename,
            location: result.location,
            etag: result.etag,
            execution_time: u64::try_from(result.execution_duration.as_millis())
                .unwrap_or(u64::MAX),
        }
    }
}
