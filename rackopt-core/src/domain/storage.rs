//! Storage domain types

use serde::{Deserialize, Serialize};

/// Outcome of uploading one file to a storage bucket
///
/// `etag` is backend-defined: always empty for the local filesystem,
/// provider-issued for object storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    pub filename: String,
    pub location: String,
    pub etag: String,
}
