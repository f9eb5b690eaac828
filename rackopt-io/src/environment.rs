//! Job environments
//!
//! An environment is a uniquely named directory owned by exactly one job.
//! The provider removes it on `cleanup()` and, as a backstop, when dropped,
//! so every exit path of the owning job releases it.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

const MAX_CREATE_ATTEMPTS: usize = 16;

/// Errors raised while acquiring or releasing an environment
#[derive(Debug, Error)]
pub enum EnvironmentError {
    #[error("invalid directory prefix '{0}'")]
    InvalidPrefix(String),

    #[error("base directory '{path}' is unusable: {source}")]
    BaseDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to create directory '{path}': {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("environment already exists at '{0}'")]
    AlreadyCreated(PathBuf),

    #[error("failed to remove directory '{path}': {source}")]
    Cleanup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Scoped temporary directory
///
/// Holds at most one directory at a time. `dir()` is `None` before `create()`
/// and after a successful `cleanup()`.
#[derive(Debug)]
pub struct EnvironmentProvider {
    base_dir: PathBuf,
    prefix: String,
    dir: Option<PathBuf>,
}

impl EnvironmentProvider {
    /// Creates a provider that allocates directories under `base_dir`
    /// with names starting with `prefix`
    pub fn new(base_dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            base_dir: base_dir.into(),
            prefix: prefix.into(),
            dir: None,
        }
    }

    /// Allocates the directory and returns its absolute path
    pub fn create(&mut self) -> Result<&Path, EnvironmentError> {
        if let Some(dir) = &self.dir {
            return Err(EnvironmentError::AlreadyCreated(dir.clone()));
        }

        if !is_valid_prefix(&self.prefix) {
            return Err(EnvironmentError::InvalidPrefix(self.prefix.clone()));
        }

        let base = std::path::absolute(&self.base_dir).map_err(|source| {
            EnvironmentError::BaseDir {
                path: self.base_dir.clone(),
                source,
            }
        })?;

        match std::fs::metadata(&base) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                return Err(EnvironmentError::BaseDir {
                    path: base,
                    source: io::Error::other("not a directory"),
                });
            }
            Err(source) => return Err(EnvironmentError::BaseDir { path: base, source }),
        }

        for _ in 0..MAX_CREATE_ATTEMPTS {
            let path = base.join(format!("{}{}", self.prefix, Uuid::new_v4().simple()));
            match std::fs::create_dir(&path) {
                Ok(()) => {
                    debug!("Created environment {}", path.display());
                    let dir = self.dir.insert(path);
                    return Ok(dir.as_path());
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(source) => return Err(EnvironmentError::Create { path, source }),
            }
        }

        Err(EnvironmentError::Create {
            path: base,
            source: io::Error::new(
                io::ErrorKind::AlreadyExists,
                "no unique directory name could be allocated",
            ),
        })
    }

    /// Absolute path of the held directory, if any
    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Recursively removes the held directory
    ///
    /// No-op when nothing is held. On failure the directory stays held so a
    /// later call (or drop) can retry.
    pub fn cleanup(&mut self) -> Result<(), EnvironmentError> {
        let Some(dir) = self.dir.as_ref() else {
            return Ok(());
        };

        match std::fs::remove_dir_all(dir) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(EnvironmentError::Cleanup {
                    path: dir.clone(),
                    source,
                });
            }
        }

        debug!("Removed environment {}", dir.display());
        self.dir = None;
        Ok(())
    }
}

impl Drop for EnvironmentProvider {
    fn drop(&mut self) {
        if let Err(e) = self.cleanup() {
            warn!("Failed to cleanup environment on drop: {}", e);
        }
    }
}

fn is_valid_prefix(prefix: &str) -> bool {
    !prefix.contains(['/', '\\', '\0']) && prefix != "." && prefix != ".."
}
