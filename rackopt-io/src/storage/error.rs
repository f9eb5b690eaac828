//! Storage error types

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by storage backends
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("directory path can't be empty")]
    EmptyDirectory,

    #[error("invalid file name '{0}'")]
    InvalidName(String),

    #[error("unknown storage type '{0}'")]
    UnknownKind(String),

    #[error("error accessing bucket '{path}': {source}")]
    BucketNotFound {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("bucket '{0}' is not a directory")]
    NotADirectory(PathBuf),

    #[error("'{0}' is not a regular file")]
    NotARegularFile(PathBuf),

    #[error("environment var {0} not set")]
    MissingCredential(&'static str),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("{context}: {message}")]
    Remote { context: String, message: String },
}

impl StorageError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}
