//! Transcode job module
//!
//! One job drives one engine child process end to end: derive the output
//! names, spawn the engine against a working file, lower its priority, follow
//! its diagnostic stream, and publish the result on a zero exit code.

use crate::diagnostics::DiagnosticLines;
use crate::encode::{build_engine_command, EngineParams, EngineProfile};
use crate::metrics::{JobMetrics, SharedMetrics};
use crate::naming::{self, CanonicalName, NameError};
use crate::priority::PriorityControl;
use crate::progress::ProgressSnapshot;
use crate::publish::{publish_artifact, PublishError};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::BufReader;

/// Error type for a job that did not publish
#[derive(Debug, Error)]
pub enum JobError {
    /// Source name does not have the camera naming shape
    #[error("Invalid name '{file_name}': {reason}")]
    InvalidName { file_name: String, reason: NameError },

    /// Another job of the batch already targets the same output
    #[error("Output {0} is already claimed by another job")]
    OutputCollision(PathBuf),

    /// Engine exited unsuccessfully; the working file is left for inspection
    #[error("{}", describe_exit(.code))]
    Engine { code: Option<i32>, log: String },

    /// Process setup or stream I/O failed
    #[error("Critical error while trying to {action}: {source}")]
    Critical {
        action: &'static str,
        #[source]
        source: io::Error,
    },

    /// Working file could not be promoted
    #[error("Publish failed: {0}")]
    Publish(#[from] PublishError),

    /// The job task panicked
    #[error("Job panicked: {0}")]
    Panicked(String),
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("Engine exited with code {}", code),
        None => "Engine was terminated by a signal".to_string(),
    }
}

/// Coarse failure classification used for reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    InvalidName,
    OutputCollision,
    EngineError,
    CriticalError,
}

impl JobError {
    pub fn kind(&self) -> FailureKind {
        match self {
            JobError::InvalidName { .. } => FailureKind::InvalidName,
            JobError::OutputCollision(_) => FailureKind::OutputCollision,
            JobError::Engine { .. } => FailureKind::EngineError,
            JobError::Critical { .. } | JobError::Publish(_) | JobError::Panicked(_) => {
                FailureKind::CriticalError
            }
        }
    }

    fn critical(action: &'static str) -> impl FnOnce(io::Error) -> JobError {
        move |source| JobError::Critical { action, source }
    }
}

/// Job state representing the current stage in the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    /// Waiting for a free slot
    Queued,
    /// Engine is running
    Transcoding,
    /// Promoting the working file
    Publishing,
    Completed,
    Failed(String),
}

impl JobState {
    /// Convert state to string for metrics
    pub fn as_str(&self) -> &str {
        match self {
            JobState::Queued => "queued",
            JobState::Transcoding => "transcoding",
            JobState::Publishing => "publishing",
            JobState::Completed => "completed",
            JobState::Failed(_) => "failed",
        }
    }
}

/// Settings shared by every job of a run
pub struct TranscodeSettings {
    pub profile: EngineProfile,
    pub working_extension: String,
    pub published_extension: String,
    pub perturb_fingerprint: bool,
    pub priority: Arc<dyn PriorityControl>,
}

/// A successfully published job
#[derive(Debug, Clone, PartialEq)]
pub struct JobOutput {
    pub id: String,
    pub source: PathBuf,
    pub published_path: PathBuf,
    pub progress: ProgressSnapshot,
}

/// Represents one transcode in flight
#[derive(Debug)]
pub struct TranscodeJob {
    /// Unique job identifier
    pub id: String,
    pub source: PathBuf,
    pub name: CanonicalName,
    pub working_path: PathBuf,
    pub published_path: PathBuf,
    pub state: JobState,
    /// Last known position in the source
    pub progress: ProgressSnapshot,
    /// Everything the engine wrote to its diagnostic stream
    log: String,
}

impl TranscodeJob {
    /// Derive names and output paths for `file_name` inside `input_dir`.
    ///
    /// Fails with [`JobError::InvalidName`] without touching the filesystem.
    pub fn prepare(
        file_name: &str,
        input_dir: &Path,
        output_dir: &Path,
        settings: &TranscodeSettings,
    ) -> Result<Self, JobError> {
        let name = naming::derive(file_name).map_err(|reason| JobError::InvalidName {
            file_name: file_name.to_string(),
            reason,
        })?;

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            source: input_dir.join(file_name),
            working_path: output_dir.join(name.file_name(&settings.working_extension)),
            published_path: output_dir.join(name.file_name(&settings.published_extension)),
            name,
            state: JobState::Queued,
            progress: ProgressSnapshot::default(),
            log: String::new(),
        })
    }

    /// Captured diagnostic output so far
    pub fn log(&self) -> &str {
        &self.log
    }

    /// Create JobMetrics from current job state
    pub fn to_metrics(&self) -> JobMetrics {
        JobMetrics {
            id: self.id.clone(),
            source: self.source.to_string_lossy().to_string(),
            stage: self.state.as_str().to_string(),
            progress: self.progress,
        }
    }

    /// Run the engine and publish its output
    ///
    /// 1. Spawns the engine with stderr piped
    /// 2. Lowers the child's priority (failure only logged)
    /// 3. Reads stderr line by line, updating progress and keeping the log
    /// 4. Waits for the exit status
    /// 5. Publishes on exit code 0, otherwise reports the engine failure and
    ///    leaves the working file in place
    pub async fn run(
        mut self,
        settings: &TranscodeSettings,
        metrics: &SharedMetrics,
    ) -> Result<JobOutput, JobError> {
        let result = self.transcode(settings, metrics).await;

        self.state = match &result {
            Ok(()) => JobState::Completed,
            Err(e) => JobState::Failed(e.to_string()),
        };
        {
            let mut m = metrics.write().await;
            m.upsert_job(self.to_metrics());
            if result.is_ok() {
                m.completed_jobs += 1;
            } else {
                m.failed_jobs += 1;
            }
        }

        result.map(|()| JobOutput {
            id: self.id,
            source: self.source,
            published_path: self.published_path,
            progress: self.progress,
        })
    }

    async fn transcode(
        &mut self,
        settings: &TranscodeSettings,
        metrics: &SharedMetrics,
    ) -> Result<(), JobError> {
        self.set_state(JobState::Transcoding, metrics).await;

        let params = EngineParams {
            input_path: self.source.clone(),
            working_path: self.working_path.clone(),
            title: self.name.base.clone(),
            comment: self.name.unique_token.clone(),
        };
        let mut child = build_engine_command(&settings.profile, &params)
            .spawn()
            .map_err(JobError::critical("start the engine"))?;

        if let Some(pid) = child.id() {
            if let Err(e) = settings.priority.lower_priority(pid) {
                log::warn!("Could not lower priority of engine pid {}: {}", pid, e);
            }
        }

        let stderr = child.stderr.take().ok_or_else(|| JobError::Critical {
            action: "capture engine diagnostics",
            source: io::Error::new(io::ErrorKind::Other, "stderr was not piped"),
        })?;

        let mut lines = DiagnosticLines::new(BufReader::new(stderr));
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    self.log.push_str(&line);
                    self.log.push('\n');
                    if self.progress.observe(&line) {
                        metrics
                            .write()
                            .await
                            .update_progress(&self.id, self.progress);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    let _ = child.kill().await;
                    return Err(JobError::Critical {
                        action: "read engine diagnostics",
                        source: e,
                    });
                }
            }
        }

        let status = child
            .wait()
            .await
            .map_err(JobError::critical("wait for the engine"))?;

        if !status.success() {
            return Err(JobError::Engine {
                code: status.code(),
                log: std::mem::take(&mut self.log),
            });
        }

        self.set_state(JobState::Publishing, metrics).await;
        publish_artifact(
            &self.working_path,
            &self.published_path,
            settings.perturb_fingerprint,
        )?;

        Ok(())
    }

    async fn set_state(&mut self, state: JobState, metrics: &SharedMetrics) {
        self.state = state;
        metrics.write().await.upsert_job(self.to_metrics());
    }
}

/// Prepare and run one job in a single call.
pub async fn run_job(
    file_name: &str,
    input_dir: &Path,
    output_dir: &Path,
    settings: &TranscodeSettings,
    metrics: &SharedMetrics,
) -> Result<JobOutput, JobError> {
    let job = TranscodeJob::prepare(file_name, input_dir, output_dir, settings)?;
    job.run(settings, metrics).await
}
