//! Archive packing
//!
//! Packs and unpacks gzip-compressed tar archives through the system `tar`.
//! Member paths are relative to the working directory given at creation.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Suffix appended to the archive base path
pub const ARCHIVE_EXTENSION: &str = ".tar.gz";

const DEFAULT_PROGRAM: &str = "tar";

/// Archive errors
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("path can't be empty")]
    EmptyPath,

    #[error("path to folder can't be empty")]
    EmptyFolderPath,

    #[error("no files were provided")]
    NoFiles,

    #[error("error compressing files: {0}")]
    Compress(String),

    #[error("error decompressing files: {0}")]
    Decompress(String),
}

/// tar+gzip codec backed by an external program
#[derive(Debug, Clone)]
pub struct ArchiveCodec {
    program: String,
}

impl Default for ArchiveCodec {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM)
    }
}

impl ArchiveCodec {
    /// Creates a codec that invokes `program` with tar-compatible arguments
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Packs `file_names` (relative to `work_dir`) into `<archive_base>.tar.gz`
    ///
    /// # Returns
    /// Full path of the created archive
    pub async fn compress(
        &self,
        archive_base: &Path,
        work_dir: &Path,
        file_names: &[String],
    ) -> Result<PathBuf, ArchiveError> {
        if archive_base.as_os_str().is_empty() {
            return Err(ArchiveError::EmptyPath);
        }
        if file_names.is_empty() {
            return Err(ArchiveError::NoFiles);
        }

        let mut archive_path = OsString::from(archive_base.as_os_str());
        archive_path.push(ARCHIVE_EXTENSION);
        let archive_path = PathBuf::from(archive_path);

        let mut command = Command::new(&self.program);
        if !work_dir.as_os_str().is_empty() {
            command.arg("-C").arg(work_dir);
        }
        command.arg("-czf").arg(&archive_path).arg("--").args(file_names);

        debug!(
            "Compressing {:?} from '{}' into '{}'",
            file_names,
            work_dir.display(),
            archive_path.display()
        );

        run(command).await.map_err(ArchiveError::Compress)?;
        Ok(archive_path)
    }

    /// Extracts the whole archive into `dest_dir`
    pub async fn decompress(&self, archive_path: &Path, dest_dir: &Path) -> Result<(), ArchiveError> {
        if archive_path.as_os_str().is_empty() {
            return Err(ArchiveError::EmptyPath);
        }
        if dest_dir.as_os_str().is_empty() {
            return Err(ArchiveError::EmptyFolderPath);
        }

        let mut command = Command::new(&self.program);
        command.arg("-xzf").arg(archive_path).arg("-C").arg(dest_dir);

        debug!(
            "Decompressing '{}' into '{}'",
            archive_path.display(),
            dest_dir.display()
        );

        run(command).await.map_err(ArchiveError::Decompress)
    }
}

/// Runs the tool to completion, returning its diagnostics on failure
async fn run(mut command: Command) -> Result<(), String> {
    let output = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| format!("failed to run archiver: {}", e))?;

    if output.status.success() {
        return Ok(());
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(format!(
        "{}, output: '{}{}'",
        output.status,
        stdout.trim(),
        stderr.trim()
    ))
}
