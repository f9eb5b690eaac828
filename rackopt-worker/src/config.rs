//! Worker configuration
//!
//! Defines the knobs of the worker: where it listens, which script it runs
//! and for how long, where job environments live and which bucket backs the
//! storage layer.

use rackopt_io::StorageKind;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tracing::error;

const DEFAULT_SCRIPT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Worker configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Socket address the HTTP server binds to
    pub bind_addr: String,

    /// Interpreter the script is handed to (e.g., "python3")
    pub interpreter: String,

    /// Optimization script, passed as the interpreter's first argument
    pub script_path: PathBuf,

    /// Hard wall-clock limit for one script run
    pub script_timeout: Duration,

    /// Name of the script working directory inside each job environment
    pub script_dir: String,

    /// File the script is expected to leave in its working directory
    pub result_filename: String,

    /// Directory job environments are created in
    pub env_base_dir: PathBuf,

    /// Name prefix of job environment directories
    pub env_prefix: String,

    /// Name prefix of uploaded result archives
    pub upload_prefix: String,

    /// Storage backend type
    pub storage_kind: StorageKind,

    /// S3 bucket name or local bucket folder
    pub storage_bucket: String,

    /// S3 region, required for the s3 backend
    pub storage_region: Option<String>,

    /// S3-compatible service URL; path-style addressing is used when set
    pub storage_endpoint: Option<String>,
}

impl Config {
    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - WORKER_BIND_ADDR (optional, default: 0.0.0.0:8080)
    /// - SCRIPT_INTERPRETER (optional, default: python3)
    /// - SCRIPT_PATH (optional, default: scripts/main.py)
    /// - SCRIPT_TIMEOUT_MS (optional, milliseconds, default: 5000)
    /// - SCRIPT_DIR (optional, default: script)
    /// - SCRIPT_RESULT_FILENAME (optional, default: def_output.csv)
    /// - ENV_BASE_DIR (optional, default: system temp dir)
    /// - ENV_PREFIX (optional, default: tmp_)
    /// - UPLOAD_PREFIX (optional, default: opt_result)
    /// - STORAGE_TYPE (optional, local | s3, default: local)
    /// - STORAGE_BUCKET (required)
    /// - STORAGE_REGION (required for s3)
    /// - STORAGE_ENDPOINT (optional, S3-compatible service URL)
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

        let script_timeout = match lookup("SCRIPT_TIMEOUT_MS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => Duration::from_millis(ms),
                _ => {
                    error!(
                        "incorrect timeout value {:?}, switching to default value of {:?}",
                        raw, DEFAULT_SCRIPT_TIMEOUT
                    );
                    DEFAULT_SCRIPT_TIMEOUT
                }
            },
            None => defaults.script_timeout,
        };

        Ok(Self {
            bind_addr: lookup("WORKER_BIND_ADDR").unwrap_or(defaults.bind_addr),
            interpreter: lookup("SCRIPT_INTERPRETER").unwrap_or(defaults.interpreter),
            script_path: lookup("SCRIPT_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.script_path),
            script_timeout,
            script_dir: lookup("SCRIPT_DIR").unwrap_or(defaults.script_dir),
            result_filename: lookup("SCRIPT_RESULT_FILENAME").unwrap_or(defaults.result_filename),
            env_base_dir: lookup("ENV_BASE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.env_base_dir),
            env_prefix: lookup("ENV_PREFIX").unwrap_or(defaults.env_prefix),
            upload_prefix: lookup("UPLOAD_PREFIX").unwrap_or(defaults.upload_prefix),
            storage_kind,
            storage_bucket,
            storage_region: lookup("STORAGE_REGION").filter(|r| !r.is_empty()),
            storage_endpoint: lookup("STORAGE_ENDPOINT").filter(|e| !e.is_empty()),
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bind_addr.is_empty() {
            anyhow::bail!("bind_addr cannot be empty");
        }

        if self.interpreter.is_empty() {
            anyhow::bail!("interpreter cannot be empty");
        }

        if self.script_path.as_os_str().is_empty() {
            anyhow::bail!("script_path cannot be empty");
        }

        if self.script_timeout.is_zero() {
            anyhow::bail!("script_timeout must be greater than 0");
        }

        if !is_plain_name(&self.script_dir) {
            anyhow::bail!("script_dir must be a single directory name");
        }

        if !is_plain_name(&self.result_filename) {
            anyhow::bail!("result_filename must be a single file name");
        }

        if self.env_prefix.contains(['/', '\\']) {
            anyhow::bail!("env_prefix cannot contain path separators");
        }

        if self.upload_prefix.is_empty() || self.upload_prefix.contains(['/', '\\']) {
            anyhow::bail!("upload_prefix must be a non-empty file name prefix");
        }

        if self.storage_bucket.is_empty() {
            anyhow::bail!("storage_bucket cannot be empty");
        }

        if self.storage_kind == StorageKind::S3 && self.storage_region.is_none() {
            anyhow::bail!("storage_region is required for the s3 backend");
        }

        if self.storage_endpoint.as_deref().is_some_and(|e| !is_http_url(e)) {
            anyhow::bail!("storage_endpoint must be an http(s) URL");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            interpreter: "python3".to_string(),
            script_path: PathBuf::from("scripts/main.py"),
            script_timeout: DEFAULT_SCRIPT_TIMEOUT,
            script_dir: "script".to_string(),
            result_filename: "def_output.csv".to_string(),
            env_base_dir: std::env::temp_dir(),
            env_prefix: "tmp_".to_string(),
            upload_prefix: "opt_result".to_string(),
            storage_kind: StorageKind::Local,
            storage_bucket: "bucket".to_string(),
            storage_region: None,
            storage_endpoint: None,
        }
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

fn is_plain_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
