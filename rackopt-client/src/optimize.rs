//! Optimization endpoint

use crate::OptimizationClient;
use crate::error::Result;
use rackopt_core::dto::optimization::{OptimizationRequest, OptimizationResponse};
use tracing::debug;

impl OptimizationClient {
    /// Ask the worker to optimize an archive already in the bucket
    ///
    /// # Arguments
    /// * `filename` - Bucket name of the input archive
    ///
    /// # Returns
    /// Location of the uploaded result archive and the script run time
    pub async fn optimize(&self, filename: &str) -> Result<OptimizationResponse> {
        let url = format!("{}/api/v1/optimize", self.base_url);
        debug!("Forwarding '{}' to {}", filename, url);

        let response = self
            .client
            .post(&url)
            .json(&OptimizationRequest::new(filename))
            .send()
            .await?;

        self.handle_response(response).await
    }
}
