//! Shared progress state for a run.
//!
//! Jobs write their stage and progress snapshot here; an attached progress
//! indicator only ever reads.

use crate::progress::ProgressSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

/// Per-job progress entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobMetrics {
    pub id: String,
    pub source: String,
    pub stage: String,
    pub progress: ProgressSnapshot,
}

/// Complete snapshot of the run
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MetricsSnapshot {
    pub jobs: Vec<JobMetrics>,
    /// Jobs dispatched but still waiting for a slot
    pub queue_len: usize,
    pub running_jobs: usize,
    pub completed_jobs: u64,
    pub failed_jobs: u64,
}

impl MetricsSnapshot {
    /// Insert or replace the entry with the same id and recount running jobs.
    pub fn upsert_job(&mut self, job_metrics: JobMetrics) {
        if let Some(existing) = self.jobs.iter_mut().find(|j| j.id == job_metrics.id) {
            *existing = job_metrics;
        } else {
            self.jobs.push(job_metrics);
        }

        self.running_jobs = self
            .jobs
            .iter()
            .filter(|j| j.stage == "transcoding" || j.stage == "publishing")
            .count();
    }

    /// Update only the progress of a known job.
    pub fn update_progress(&mut self, id: &str, progress: ProgressSnapshot) {
        if let Some(existing) = self.jobs.iter_mut().find(|j| j.id == id) {
            existing.progress = progress;
        }
    }
}

/// Shared metrics state for concurrent access across jobs
pub type SharedMetrics = Arc<RwLock<MetricsSnapshot>>;

/// Creates a new SharedMetrics instance with default values
pub fn new_shared_metrics() -> SharedMetrics {
    Arc::new(RwLock::new(MetricsSnapshot::default()))
}

/// Periodically logs the percentage of every running job whose duration is
/// known. A job is logged again only after advancing at least one percent.
pub fn spawn_progress_reporter(metrics: SharedMetrics, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_reported: HashMap<String, f64> = HashMap::new();
        loop {
            {
                let snapshot = metrics.read().await;
                for job in snapshot.jobs.iter().filter(|j| j.stage == "transcoding") {
                    let Some(fraction) = job.progress.fraction() else {
                        continue;
                    };
                    let pct = fraction * 100.0;
                    let previous = last_reported.get(&job.id).copied().unwrap_or(-1.0);
                    if pct - previous >= 1.0 {
                        log::info!(
                            "{}: {:.1}% ({:.1}s/{:.1}s)",
                            job.source,
                            pct,
                            job.progress.elapsed_secs,
                            job.progress.total_secs
                        );
                        last_reported.insert(job.id.clone(), pct);
                    }
                }
            }
            tokio::time::sleep(interval).await;
        }
    })
}
