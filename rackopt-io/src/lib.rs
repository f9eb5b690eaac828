//! Rackopt I/O
//!
//! Filesystem, archive and storage building blocks shared by the worker and
//! the gateway:
//! - `environment`: scoped per-job temporary directories
//! - `archive`: tar+gzip packing through the system `tar`
//! - `storage`: bucket download/upload for local folders and S3
//! - `naming`: collision-free artifact names
//! - `metrics`: Prometheus request and stage metrics

pub mod archive;
pub mod environment;
pub mod metrics;
pub mod naming;
pub mod storage;

pub use archive::{ArchiveCodec, ArchiveError};
pub use environment::{EnvironmentError, EnvironmentProvider};
pub use metrics::Metrics;
pub use naming::timestamped_name;
pub use storage::{Storage, StorageBackend, StorageError, StorageKind};
