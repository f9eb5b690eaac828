//! Bodies shared by every endpoint

use serde::{Deserialize, Serialize};

/// Health check body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub health: bool,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self { health: true }
    }
}

/// General error body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub text: String,
}

impl ErrorResponse {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}
