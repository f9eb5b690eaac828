//! Pipeline domain types

use std::fmt;
use std::time::Duration;

/// The sole successful outcome of a job
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineResult {
    pub filename: String,
    pub location: String,
    pub etag: String,
    /// Measured run time of the optimization script
    pub execution_duration: Duration,
}

/// Terminal failure of a job
///
/// Closed taxonomy: every stage failure maps to exactly one kind and the kind
/// carries nothing else. Details are logged where the failure happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum PipelineError {
    #[error("error creating tempdir")]
    EnvironmentCreate,

    #[error("download error")]
    Download,

    #[error("decompression error")]
    Decompress,

    #[error("internal error")]
    Internal,

    #[error("compression error")]
    Compress,

    #[error("optimization script error")]
    Optimize,

    #[error("upload error")]
    Upload,
}

/// Progress of a job through the pipeline
///
/// `Created → EnvironmentReady → Downloaded → Decompressed → Executed →
/// Compressed → Uploaded → Done`; any stage may end in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Created,
    EnvironmentReady,
    Downloaded,
    Decompressed,
    Executed,
    Compressed,
    Uploaded,
    Done,
    Failed(PipelineError),
}

impl JobState {
    /// State reached when the current stage succeeds
    ///
    /// Terminal states have no successor.
    pub fn next(self) -> Option<JobState> {
        match self {
            JobState::Created => Some(JobState::EnvironmentReady),
            JobState::EnvironmentReady => Some(JobState::Downloaded),
            JobState::Downloaded => Some(JobState::Decompressed),
            JobState::Decompressed => Some(JobState::Executed),
            JobState::Executed => Some(JobState::Compressed),
            JobState::Compressed => Some(JobState::Uploaded),
            JobState::Uploaded => Some(JobState::Done),
            JobState::Done | JobState::Failed(_) => None,
        }
    }

    /// Name of the stage that leads out of this state
    ///
    /// This is the stage being attempted while the job sits in the state, so
    /// a failure raised there is attributed to it.
    pub fn stage(self) -> Option<&'static str> {
        match self {
            JobState::Created => Some("environment"),
            JobState::EnvironmentReady => Some("download"),
            JobState::Downloaded => Some("decompress"),
            JobState::Decompressed => Some("optimize"),
            JobState::Executed => Some("compress"),
            JobState::Compressed => Some("upload"),
            JobState::Uploaded => Some("report"),
            JobState::Done | JobState::Failed(_) => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::Failed(_))
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Created => write!(f, "created"),
            JobState::EnvironmentReady => write!(f, "environment_ready"),
            JobState::Downloaded => write!(f, "downloaded"),
            JobState::Decompressed => write!(f, "decompressed"),
            JobState::Executed => write!(f, "executed"),
            JobState::Compressed => write!(f, "compressed"),
            JobState::Uploaded => write!(f, "uploaded"),
            JobState::Done => write!(f, "done"),
            JobState::Failed(kind) => write!(f, "failed({kind})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_state_walks_to_done() {
        let mut state = JobState::Created;
        let mut steps = 0;
        while let Some(next) = state.next() {
            state = next;
            steps += 1;
        }
        assert_eq!(state, JobState::Done);
        assert_eq!(steps, 7);
    }

    #[test]
    fn test_failed_is_terminal() {
        let failed = JobState::Failed(PipelineError::Upload);
        assert!(failed.is_terminal());
        assert_eq!(failed.next(), None);
        assert_eq!(failed.to_string(), "failed(upload error)");
        assert!(!JobState::Executed.is_terminal());
    }

    #[test]
    fn test_stage_names_follow_the_next_transition() {
        assert_eq!(JobState::Created.stage(), Some("environment"));
        assert_eq!(JobState::EnvironmentReady.stage(), Some("download"));
        assert_eq!(JobState::Decompressed.stage(), Some("optimize"));
        assert_eq!(JobState::Compressed.stage(), Some("upload"));
        assert_eq!(JobState::Done.stage(), None);
        assert_eq!(JobState::Failed(PipelineError::Upload).stage(), None);

        let mut state = JobState::Created;
        while let Some(next) = state.next() {
            assert!(state.stage().is_some());
            state = next;
        }
    }
}
