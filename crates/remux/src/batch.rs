//! Batch orchestration
//!
//! One batch covers one input directory: discover candidates, gate them on
//! stability, run them through a bounded pool of transcode jobs and aggregate
//! the outcomes. No single job can abort the batch.

use crate::concurrency::{derive_plan, ConcurrencyPlan};
use crate::config::{Config, DirectoryPair};
use crate::encode::EngineProfile;
use crate::job::{FailureKind, JobError, JobOutput, TranscodeJob, TranscodeSettings};
use crate::metrics::{new_shared_metrics, SharedMetrics};
use crate::priority::{platform_priority, PriorityControl};
use crate::scan::{list_candidates, SourceFile};
use crate::stability::is_stable;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Error type for failures that prevent a batch from running at all
#[derive(Debug, Error)]
pub enum BatchError {
    /// Input directory missing or unreadable
    #[error("Cannot read input directory {path}: {source}")]
    InputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Output directory could not be created
    #[error("Cannot create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Working and published files would share a name
    #[error("Working extension '{0}' matches the published extension")]
    SharedExtension(String),
}

/// Aggregate outcome of one or more batches
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    /// Jobs whose output was published
    pub succeeded: u64,
    /// Stable files handed to the job pool
    pub attempted: u64,
    /// Files skipped because they were still being written
    pub unstable: u64,
    /// Wall time spent
    pub elapsed: Duration,
}

impl BatchResult {
    pub fn failed(&self) -> u64 {
        self.attempted - self.succeeded
    }

    /// Fold another batch into this one.
    pub fn merge(&mut self, other: &BatchResult) {
        self.succeeded += other.succeeded;
        self.attempted += other.attempted;
        self.unstable += other.unstable;
        self.elapsed += other.elapsed;
    }
}

/// Static settings for discovery and dispatch
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSettings {
    pub max_concurrent_jobs: usize,
    pub stability_wait_secs: u64,
    pub input_extension: String,
}

/// Drives batches for one run
pub struct BatchOrchestrator {
    settings: BatchSettings,
    transcode: Arc<TranscodeSettings>,
    metrics: SharedMetrics,
}

impl BatchOrchestrator {
    /// Build an orchestrator from configuration and the resolved engine path
    pub fn new(config: &Config, engine_program: PathBuf) -> Self {
        Self::with_priority(config, engine_program, Arc::from(platform_priority()))
    }

    /// Same as [`BatchOrchestrator::new`] with an explicit priority control
    pub fn with_priority(
        config: &Config,
        engine_program: PathBuf,
        priority: Arc<dyn PriorityControl>,
    ) -> Self {
        let plan = derive_plan(config);
        Self::from_plan(config, &plan, engine_program, priority)
    }

    pub fn from_plan(
        config: &Config,
        plan: &ConcurrencyPlan,
        engine_program: PathBuf,
        priority: Arc<dyn PriorityControl>,
    ) -> Self {
        let settings = BatchSettings {
            max_concurrent_jobs: plan.max_concurrent_jobs as usize,
            stability_wait_secs: config.batch.stability_wait_secs,
            input_extension: config.batch.input_extension.clone(),
        };
        let transcode = TranscodeSettings {
            profile: EngineProfile::new(engine_program, &config.engine, plan),
            working_extension: config.batch.working_extension.clone(),
            published_extension: config.batch.published_extension.clone(),
            perturb_fingerprint: config.batch.perturb_fingerprint,
            priority,
        };
        Self {
            settings,
            transcode: Arc::new(transcode),
            metrics: new_shared_metrics(),
        }
    }

    pub fn settings(&self) -> &BatchSettings {
        &self.settings
    }

    /// Get the shared metrics
    pub fn metrics(&self) -> SharedMetrics {
        self.metrics.clone()
    }

    /// Run every directory pair in order and merge the results.
    ///
    /// A pair that cannot run is logged and contributes nothing.
    pub async fn run_all(&self, pairs: &[DirectoryPair]) -> BatchResult {
        let mut overall = BatchResult::default();
        for pair in pairs {
            match self
                .run_batch(&pair.input, &pair.output, self.settings.max_concurrent_jobs)
                .await
            {
                Ok(result) => overall.merge(&result),
                Err(e) => log::error!("{}", e),
            }
        }
        overall
    }

    /// Run one directory batch with at most `max_concurrency` engines alive.
    pub async fn run_batch(
        &self,
        input_dir: &Path,
        output_dir: &Path,
        max_concurrency: usize,
    ) -> Result<BatchResult, BatchError> {
        let started = Instant::now();
        let mut result = BatchResult::default();

        let working = self.transcode.working_extension.trim_start_matches('.');
        let published = self.transcode.published_extension.trim_start_matches('.');
        if working.eq_ignore_ascii_case(published) {
            return Err(BatchError::SharedExtension(working.to_string()));
        }

        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|source| BatchError::OutputDir {
                path: output_dir.to_path_buf(),
                source,
            })?;

        let candidates = list_candidates(input_dir, &self.settings.input_extension).map_err(
            |source| BatchError::InputDir {
                path: input_dir.to_path_buf(),
                source,
            },
        )?;

        if candidates.is_empty() {
            log::warn!(
                "No .{} files in '{}'",
                self.settings.input_extension,
                input_dir.display()
            );
            result.elapsed = started.elapsed();
            return Ok(result);
        }

        log::info!(
            "Processing '{}' ({} files)",
            input_dir.display(),
            candidates.len()
        );

        // Sequential on purpose: one sleep per file, not N overlapping ones
        let mut stable: Vec<SourceFile> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if is_stable(&candidate.path, self.settings.stability_wait_secs).await {
                stable.push(candidate);
            } else {
                log::warn!("'{}' is not stable yet, skipping", candidate.file_name);
                result.unstable += 1;
            }
        }

        result.attempted = stable.len() as u64;
        log::info!("Stable files to process: {}", stable.len());

        let total = stable.len();
        let mut finished = 0usize;
        let mut claimed: HashSet<PathBuf> = HashSet::new();
        let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
        let mut pool: JoinSet<(String, Result<JobOutput, JobError>)> = JoinSet::new();

        for source in stable {
            let job = match TranscodeJob::prepare(
                &source.file_name,
                input_dir,
                output_dir,
                &self.transcode,
            ) {
                Ok(job) => job,
                Err(e) => {
                    finished += 1;
                    report_outcome(finished, total, &source.file_name, &Err(e));
                    continue;
                }
            };

            if !claimed.insert(job.published_path.clone())
                || !claimed.insert(job.working_path.clone())
            {
                finished += 1;
                let collision = Err(JobError::OutputCollision(job.published_path.clone()));
                report_outcome(finished, total, &source.file_name, &collision);
                continue;
            }

            self.metrics.write().await.upsert_job(job.to_metrics());
            self.metrics.write().await.queue_len += 1;

            let semaphore = semaphore.clone();
            let settings = self.transcode.clone();
            let metrics = self.metrics.clone();
            let file_name = source.file_name;

            pool.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        let source = std::io::Error::new(std::io::ErrorKind::Other, e);
                        return (
                            file_name,
                            Err(JobError::Critical {
                                action: "acquire a job slot",
                                source,
                            }),
                        );
                    }
                };
                {
                    let mut m = metrics.write().await;
                    m.queue_len = m.queue_len.saturating_sub(1);
                }

                // Inner task so a panic is attributed to its file
                let worker = tokio::spawn(async move { job.run(&settings, &metrics).await });
                let outcome = match worker.await {
                    Ok(outcome) => outcome,
                    Err(e) => Err(JobError::Panicked(e.to_string())),
                };
                (file_name, outcome)
            });
        }

        // Completion order, single writer for the counters
        while let Some(joined) = pool.join_next().await {
            finished += 1;
            match joined {
                Ok((file_name, outcome)) => {
                    if outcome.is_ok() {
                        result.succeeded += 1;
                    }
                    report_outcome(finished, total, &file_name, &outcome);
                }
                Err(e) => {
                    log::error!("[{}/{}] Job task failed: {}", finished, total, e);
                }
            }
        }

        result.elapsed = started.elapsed();
        Ok(result)
    }
}

fn report_outcome(
    finished: usize,
    total: usize,
    file_name: &str,
    outcome: &Result<JobOutput, JobError>,
) {
    match outcome {
        Ok(output) => log::info!(
            "[{}/{}] Completed: {} -> {}",
            finished,
            total,
            file_name,
            output.published_path.display()
        ),
        Err(JobError::Engine { code, log }) => log::error!(
            "[{}/{}] Engine error on {} (exit code {:?})\n---- engine log ----\n{}---------------------",
            finished,
            total,
            file_name,
            code,
            log
        ),
        Err(e) => {
            let level = failure_level(e.kind());
            let verb = if level == log::Level::Warn {
                "Rejected"
            } else {
                "Failed"
            };
            log::log!(
                level,
                "[{}/{}] {}: {} ({:?}): {}",
                finished,
                total,
                verb,
                file_name,
                e.kind(),
                e
            )
        }
    }
}

/// Names that are not camera files are expected input, not faults.
fn failure_level(kind: FailureKind) -> log::Level {
    match kind {
        FailureKind::InvalidName => log::Level::Warn,
        _ => log::Level::Error,
    }
}
