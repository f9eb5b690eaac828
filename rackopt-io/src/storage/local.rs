//! Local filesystem storage
//!
//! A folder stands in for the bucket; downloads and uploads are plain copies.

use async_trait::async_trait;
use rackopt_core::domain::storage::UploadResult;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{StorageBackend, StorageError};

/// Folder-backed bucket
#[derive(Debug, Clone)]
pub struct LocalStorage {
    bucket: PathBuf,
}

impl LocalStorage {
    /// Opens the bucket folder
    ///
    /// Fails if the folder does not exist or is not a directory.
    pub fn new(bucket: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let bucket = bucket.into();
        let metadata = std::fs::metadata(&bucket).map_err(|source| StorageError::BucketNotFound {
            path: bucket.clone(),
            source,
        })?;
        if !metadata.is_dir() {
            return Err(StorageError::NotADirectory(bucket));
        }

        let bucket = std::path::absolute(&bucket)
            .map_err(|e| StorageError::io(format!("unable to resolve '{}'", bucket.display()), e))?;

        Ok(Self { bucket })
    }

    /// Absolute path of the bucket folder
    pub fn bucket(&self) -> &Path {
        &self.bucket
    }
}

#[async_trait]
impl StorageBackend for LocalStorage {
    async fn download_file(&self, dir: &Path, name: &str) -> Result<(), StorageError> {
        let src = self.bucket.join(name);
        let dst = dir.join(name);
        debug!("Downloading file '{}' to '{}'", src.display(), dst.display());

        copy_file(&src, &dst).await.map_err(|e| match e {
            StorageError::Io { source, .. } => StorageError::io(
                format!(
                    "unable to download '{}' from bucket '{}'",
                    name,
                    self.bucket.display()
                ),
                source,
            ),
            other => other,
        })
    }

    async fn upload_file(&self, dir: &Path, name: &str) -> Result<UploadResult, StorageError> {
        let src = dir.join(name);
        let dst = self.bucket.join(name);
        debug!("Uploading file '{}' to the bucket...", src.display());

        copy_file(&src, &dst).await.map_err(|e| match e {
            StorageError::Io { source, .. } => StorageError::io(
                format!(
                    "unable to upload '{}' to local bucket '{}'",
                    src.display(),
                    self.bucket.display()
                ),
                source,
            ),
            other => other,
        })?;

        Ok(UploadResult {
            filename: name.to_string(),
            location: dst.to_string_lossy().into_owned(),
            etag: String::new(),
        })
    }
}

/// Copies a regular file, checking the source before the destination is touched
async fn copy_file(src: &Path, dst: &Path) -> Result<(), StorageError> {
    let metadata = tokio::fs::metadata(src)
        .await
        .map_err(|e| StorageError::io(format!("unable to access '{}'", src.display()), e))?;
    if !metadata.is_file() {
        return Err(StorageError::NotARegularFile(src.to_path_buf()));
    }

    let copied = tokio::fs::copy(src, dst)
        .await
        .map_err(|e| StorageError::io(format!("unable to copy to '{}'", dst.display()), e))?;
    debug!("Copied {} bytes to '{}'", copied, dst.display());
    Ok(())
}
