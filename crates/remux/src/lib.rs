//! insv-remux
//!
//! Batch re-encoder for 360° camera recordings: finds finished `.insv` files,
//! runs them through ffmpeg with a bounded number of low-priority child
//! processes, and publishes renamed, re-stamped outputs.

pub mod batch;
pub mod concurrency;
pub mod diagnostics;
pub mod encode;
pub mod job;
pub mod metrics;
pub mod naming;
pub mod priority;
pub mod progress;
pub mod publish;
pub mod scan;
pub mod stability;
pub mod startup;

pub use insv_remux_config as config;
pub use insv_remux_config::{Config, DirectoryPair};
pub use batch::{BatchError, BatchOrchestrator, BatchResult, BatchSettings};
pub use concurrency::{derive_plan, ConcurrencyPlan};
pub use job::{run_job, FailureKind, JobError, JobOutput, JobState, TranscodeJob, TranscodeSettings};
pub use metrics::{new_shared_metrics, spawn_progress_reporter, JobMetrics, MetricsSnapshot, SharedMetrics};
pub use naming::{derive, derive_at, CanonicalName, NameError};
pub use priority::{platform_priority, KeepPriority, PriorityControl};
pub use progress::{parse_duration_line, parse_progress_line, ProgressSnapshot};
pub use stability::{check_stability, is_stable, StabilityResult};
pub use startup::{check_engine_available, resolve_engine, run_startup_checks, StartupError};
