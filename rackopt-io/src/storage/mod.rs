//! Storage backends
//!
//! A bucket is either a local folder or an S3 bucket. Both backends expose
//! the same contract: multi-file calls run sequentially and abort on the
//! first failure without returning partial results.
//!
//! Backends hold no per-call mutable state, so one instance is shared by all
//! concurrent jobs.

mod error;
pub mod local;
pub mod remote;

pub use error::StorageError;
pub use local::LocalStorage;
pub use remote::RemoteStorage;

use async_trait::async_trait;
use rackopt_core::domain::storage::UploadResult;
use std::path::{Component, Path};
use std::str::FromStr;

/// Download/upload contract shared by all backends
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Copies bucket object `name` into `dir/name`
    async fn download_file(&self, dir: &Path, name: &str) -> Result<(), StorageError>;

    /// Copies `dir/name` into the bucket under `name`
    async fn upload_file(&self, dir: &Path, name: &str) -> Result<UploadResult, StorageError>;

    /// Downloads every name into `dir`, stopping at the first failure
    async fn download(&self, dir: &Path, names: &[String]) -> Result<(), StorageError> {
        check_dir(dir)?;
        for name in names {
            check_name(name)?;
            self.download_file(dir, name).await?;
        }
        Ok(())
    }

    /// Uploads every name from `dir`, stopping at the first failure
    async fn upload(&self, dir: &Path, names: &[String]) -> Result<Vec<UploadResult>, StorageError> {
        check_dir(dir)?;
        let mut results = Vec::with_capacity(names.len());
        for name in names {
            check_name(name)?;
            results.push(self.upload_file(dir, name).await?);
        }
        Ok(results)
    }
}

/// Configured backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Local,
    S3,
}

impl FromStr for StorageKind {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(StorageKind::Local),
            "s3" => Ok(StorageKind::S3),
            other => Err(StorageError::UnknownKind(other.to_string())),
        }
    }
}

/// Backend resolved once at startup
pub enum Storage {
    Local(LocalStorage),
    Remote(RemoteStorage),
}

impl Storage {
    /// Builds the backend for `kind`
    ///
    /// `endpoint` overrides the S3 service URL and is ignored for local
    /// buckets. Fails when the local bucket folder is unusable or S3
    /// credentials are missing from the environment.
    pub async fn connect(
        kind: StorageKind,
        bucket: &str,
        region: Option<&str>,
        endpoint: Option<&str>,
    ) -> Result<Self, StorageError> {
        match kind {
            StorageKind::Local => Ok(Storage::Local(LocalStorage::new(bucket)?)),
            StorageKind::S3 => Ok(Storage::Remote(
                RemoteStorage::new(region.unwrap_or_default(), bucket, endpoint).await?,
            )),
        }
    }

    pub fn kind(&self) -> StorageKind {
        match self {
            Storage::Local(_) => StorageKind::Local,
            Storage::Remote(_) => StorageKind::S3,
        }
    }
}

#[async_trait]
impl StorageBackend for Storage {
    async fn download_file(&self, dir: &Path, name: &str) -> Result<(), StorageError> {
        match self {
            Storage::Local(storage) => storage.download_file(dir, name).await,
            Storage::Remote(storage) => storage.download_file(dir, name).await,
        }
    }

    async fn upload_file(&self, dir: &Path, name: &str) -> Result<UploadResult, StorageError> {
        match self {
            Storage::Local(storage) => storage.upload_file(dir, name).await,
            Storage::Remote(storage) => storage.upload_file(dir, name).await,
        }
    }
}

fn check_dir(dir: &Path) -> Result<(), StorageError> {
    if dir.as_os_str().is_empty() {
        return Err(StorageError::EmptyDirectory);
    }
    Ok(())
}

/// Accepts only a single plain path component
fn check_name(name: &str) -> Result<(), StorageError> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(StorageError::InvalidName(name.to_string())),
    }
}
