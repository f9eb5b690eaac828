//! Rackopt HTTP Client
//!
//! Typed client for the worker's job request boundary. The gateway uses it to
//! hand an uploaded archive over for optimization.
//!
//! # Example
//!
//! ```no_run
//! use rackopt_client::OptimizationClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), rackopt_client::ClientError> {
//!     let client = OptimizationClient::new("http://localhost:8080");
//!     let result = client.optimize("input_files_1700000000000.tar.gz").await?;
//!
//!     println!("Result stored at {}", result.location);
//!     Ok(())
//! }
//! ```

pub mod error;
mod optimize;

pub use error::{ClientError, Result};
pub use rackopt_core::dto::optimization::OptimizationResponse;

use rackopt_core::dto::common::ErrorResponse;
use reqwest::Client;
use serde::de::DeserializeOwned;

/// HTTP client for the worker API
#[derive(Debug, Clone)]
pub struct OptimizationClient {
    /// Base URL of the worker (e.g., "http://localhost:8080")
    base_url: String,
    client: Client,
}

impl OptimizationClient {
    /// Create a new client for the worker at `base_url`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new client with a custom HTTP client
    ///
    /// Jobs run for as long as the script does, so callers that need a
    /// bound should configure the timeout on `client`.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the worker
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Handle an API response and deserialize JSON
    ///
    /// Error bodies carry `{"text": ...}`; when they don't, the raw body is
    /// used as the message.
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|err| err.text)
                .unwrap_or(body);
            return Err(ClientError::api_error(status.as_u16(), message));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = OptimizationClient::new("http://localhost:8080");
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = OptimizationClient::new("http://localhost:8080/");
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_client_with_custom_client() {
        let client = OptimizationClient::with_client("http://localhost:8080", Client::new());
        assert_eq!(client.base_url(), "http://localhost:8080");
    }
}
