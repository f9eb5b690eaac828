//! Gateway configuration

use rackopt_io::StorageKind;
use std::path::PathBuf;

const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 << 20;

/// Gateway configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Socket address the HTTP server binds to
    pub bind_addr: String,

    /// Base URL of the worker
    pub worker_url: String,

    /// Directory upload environments are created in
    pub env_base_dir: PathBuf,

    pub storage_kind: StorageKind,
    pub storage_bucket: String,
    pub storage_region: Option<String>,

    /// S3-compatible service URL
    pub storage_endpoint: Option<String>,

    /// Largest accepted request body
    pub max_upload_bytes: usize,
}

impl Config {
    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - GATEWAY_BIND_ADDR (optional, default: 0.0.0.0:8090)
    /// - WORKER_URL (optional, default: http://127.0.0.1:8080)
    /// - ENV_BASE_DIR (optional, default: system temp dir)
    /// - STORAGE_TYPE (optional, local | s3, default: local)
    /// - STORAGE_BUCKET (required)
    /// - STORAGE_REGION (required for s3)
    /// - STORAGE_ENDPOINT (optional, S3-compatible service URL)
    /// - MAX_UPLOAD_BYTES (optional, default: 10 MiB)
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let storage_bucket = lookup("STORAGE_BUCKET")
            .ok_or_else(|| anyhow::anyhow!("STORAGE_BUCKET environment variable not set"))?;

        let storage_kind = match lookup("STORAGE_TYPE") {
            Some(kind) => kind.parse::<StorageKind>()?,
            None => defaults.storage_kind,
        };

        let max_upload_bytes = match lookup("MAX_UPLOAD_BYTES") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .map_err(|e| anyhow::anyhow!("invalid MAX_UPLOAD_BYTES '{}': {}", raw, e))?,
            None => defaults.max_upload_bytes,
        };

        Ok(Self {
            bind_addr: lookup("GATEWAY_BIND_ADDR").unwrap_or(defaults.bind_addr),
            worker_url: lookup("WORKER_URL").unwrap_or(defaults.worker_url),
            env_base_dir: lookup("ENV_BASE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.env_base_dir),
            storage_kind,
            storage_bucket,
            storage_region: lookup("STORAGE_REGION").filter(|r| !r.is_empty()),
            storage_endpoint: lookup("STORAGE_ENDPOINT").filter(|e| !e.is_empty()),
            max_upload_bytes,
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bind_addr.is_empty() {
            anyhow::bail!("bind_addr cannot be empty");
        }

        if self.worker_url.is_empty() {
            anyhow::bail!("worker_url cannot be empty");
        }

        if self.storage_bucket.is_empty() {
            anyhow::bail!("storage_bucket cannot be empty");
        }

        if self.storage_kind == StorageKind::S3 && self.storage_region.is_none() {
            anyhow::bail!("storage_region is required for the s3 backend");
        }

        if let Some(endpoint) = &self.storage_endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                anyhow::bail!("storage_endpoint must be an http(s) URL");
            }
        }

        if self.max_upload_bytes == 0 {
            anyhow::bail!("max_upload_bytes must be greater than 0");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8090".to_string(),
            worker_url: "http://127.0.0.1:8080".to_string(),
            env_base_dir: std::env::temp_dir(),
            storage_kind: StorageKind::Local,
            storage_bucket: "bucket".to_string(),
            storage_region: None,
            storage_endpoint: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}
