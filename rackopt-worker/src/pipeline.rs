//! Optimization pipeline
//!
//! Strings the environment, storage, archive and script components into one
//! job. Stages run strictly in order; the first failure ends the job with a
//! single `PipelineError` kind after the underlying error has been logged.
//! The job environment is removed on every exit path. Each stage is timed,
//! and the stage a job fails in is counted.

use async_trait::async_trait;
use rackopt_core::domain::pipeline::{JobState, PipelineError, PipelineResult};
use rackopt_io::{ArchiveCodec, EnvironmentProvider, Metrics, StorageBackend, timestamped_name};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::script::ScriptRunner;

/// Executes one job per call
#[async_trait]
pub trait Pipeline: Send + Sync {
    /// Runs a job for the archive `filename` stored in the bucket
    async fn execute(&self, filename: &str) -> Result<PipelineResult, PipelineError>;
}

/// Names and locations used by every job
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub env_base_dir: PathBuf,
    pub env_prefix: String,
    /// Subdirectory of the environment the input is unpacked into
    pub script_dir: String,
    /// File the script leaves in `script_dir`
    pub result_filename: String,
    pub upload_prefix: String,
}

impl From<&Config> for PipelineSettings {
    fn from(config: &Config) -> Self {
        Self {
            env_base_dir: config.env_base_dir.clone(),
            env_prefix: config.env_prefix.clone(),
            script_dir: config.script_dir.clone(),
            result_filename: config.result_filename.clone(),
            upload_prefix: config.upload_prefix.clone(),
        }
    }
}

/// Standard pipeline implementation
pub struct OptimizationPipeline {
    storage: Arc<dyn StorageBackend>,
    runner: ScriptRunner,
    archive: ArchiveCodec,
    settings: PipelineSettings,
    metrics: Metrics,
}

impl OptimizationPipeline {
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        runner: ScriptRunner,
        archive: ArchiveCodec,
        settings: PipelineSettings,
        metrics: Metrics,
    ) -> Self {
        Self {
            storage,
            runner,
            archive,
            settings,
            metrics,
        }
    }

    async fn run(
        &self,
        env: &mut EnvironmentProvider,
        filename: &str,
        job: &mut JobTracker,
    ) -> Result<PipelineResult, PipelineError> {
        let env_dir = match env.create() {
            Ok(dir) => dir.to_path_buf(),
            Err(e) => {
                error!(stage = job.stage(), "Failed to create job environment: {}", e);
                return Err(job.fail(PipelineError::EnvironmentCreate));
            }
        };

        let script_dir = env_dir.join(&self.settings.script_dir);
        if let Err(e) = tokio::fs::create_dir(&script_dir).await {
            error!(
                stage = job.stage(),
                "Failed to create script directory '{}': {}",
                script_dir.display(),
                e
            );
            return Err(job.fail(PipelineError::EnvironmentCreate));
        }
        job.advance();

        if let Err(e) = self
            .storage
            .download(&env_dir, &[filename.to_string()])
            .await
        {
            error!(stage = job.stage(), "Failed to download '{}': {}", filename, e);
            return Err(job.fail(PipelineError::Download));
        }
        job.advance();

        if let Err(e) = self
            .archive
            .decompress(&env_dir.join(filename), &script_dir)
            .await
        {
            error!(stage = job.stage(), "Failed to decompress '{}': {}", filename, e);
            return Err(job.fail(PipelineError::Decompress));
        }
        job.advance();

        let args = match list_entries(&script_dir).await {
            Ok(args) => args,
            Err(e) => {
                error!(
                    stage = job.stage(),
                    "Failed to list '{}': {}",
                    script_dir.display(),
                    e
                );
                return Err(job.fail(PipelineError::Internal));
            }
        };

        let execution = self.runner.optimize(&script_dir, &args).await;
        if !execution.succeeded() {
            if execution.timed_out() {
                error!(
                    stage = job.stage(),
                    "Script timed out after {:?}, output: '{}'",
                    self.runner.timeout(),
                    execution.output
                );
            } else {
                error!(
                    stage = job.stage(),
                    "Script failed with exit code {} ({}), output: '{}'",
                    execution.exit_code,
                    execution.shell_error,
                    execution.output
                );
            }
            return Err(job.fail(PipelineError::Optimize));
        }
        debug!(
            "Script finished in {:?}, output: '{}'",
            execution.duration, execution.output
        );
        job.advance();

        let archive_base = env_dir.join(timestamped_name(&self.settings.upload_prefix));
        let archive_path = match self
            .archive
            .compress(
                &archive_base,
                &script_dir,
                &[self.settings.result_filename.clone()],
            )
            .await
        {
            Ok(path) => path,
            Err(e) => {
                error!(stage = job.stage(), "Failed to compress the result: {}", e);
                return Err(job.fail(PipelineError::Compress));
            }
        };
        job.advance();

        let Some(archive_name) = archive_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
        else {
            error!(
                stage = job.stage(),
                "Archive path '{}' has no file name",
                archive_path.display()
            );
            return Err(job.fail(PipelineError::Internal));
        };

        let uploaded = match self.storage.upload(&env_dir, &[archive_name]).await {
            Ok(results) => results,
            Err(e) => {
                error!(stage = job.stage(), "Failed to upload the result: {}", e);
                return Err(job.fail(PipelineError::Upload));
            }
        };
        job.advance();

        let Some(uploaded) = uploaded.into_iter().next() else {
            error!(stage = job.stage(), "Upload returned no results");
            return Err(job.fail(PipelineError::Internal));
        };
        job.advance();

        Ok(PipelineResult {
            filename: uploaded.filename,
            location: uploaded.location,
            etag: uploaded.etag,
            execution_duration: execution.duration,
        })
    }
}

#[async_trait]
impl Pipeline for OptimizationPipeline {
    async fn execute(&self, filename: &str) -> Result<PipelineResult, PipelineError> {
        let job_id = Uuid::new_v4();
        let span = info_span!("job", %job_id, filename);

        async move {
            info!("Starting job");

            let mut env =
                EnvironmentProvider::new(&self.settings.env_base_dir, &self.settings.env_prefix);
            let mut job = JobTracker::new(self.metrics.clone());

            let outcome = self.run(&mut env, filename, &mut job).await;
            debug_assert!(job.state.is_terminal());

            if let Err(e) = env.cleanup() {
                warn!("Failed to cleanup job environment: {}", e);
            }

            match &outcome {
                Ok(result) => info!(
                    "Job {}, result '{}' at {}",
                    job.state, result.filename, result.location
                ),
                Err(_) => info!("Job {}", job.state),
            }

            outcome
        }
        .instrument(span)
        .await
    }
}

/// Tracks the job state machine and times the stage in progress
struct JobTracker {
    state: JobState,
    metrics: Metrics,
    stage_started: Instant,
}

impl JobTracker {
    fn new(metrics: Metrics) -> Self {
        Self {
            state: JobState::Created,
            metrics,
            stage_started: Instant::now(),
        }
    }

    /// Stage being attempted from the current state
    fn stage(&self) -> &'static str {
        self.state.stage().unwrap_or("none")
    }

    fn advance(&mut self) {
        if let Some(next) = self.state.next() {
            debug!("Job state: {} -> {}", self.state, next);
            self.finish_stage();
            self.state = next;
        }
    }

    fn fail(&mut self, kind: PipelineError) -> PipelineError {
        if let Some(stage) = self.state.stage() {
            self.metrics.record_failure(stage);
        }
        self.finish_stage();
        self.state = JobState::Failed(kind);
        kind
    }

    fn finish_stage(&mut self) {
        if let Some(stage) = self.state.stage() {
            self.metrics
                .observe_stage(stage, self.stage_started.elapsed());
        }
        self.stage_started = Instant::now();
    }
}

/// Sorted entry names of `dir`
async fn list_entries(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}
