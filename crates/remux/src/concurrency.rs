//! Concurrency planning module
//!
//! Derives the width of the job pool and the encoder thread count from CPU
//! core count and configuration.

use crate::config::Config;

/// Default number of concurrent transcode slots per directory batch
pub const DEFAULT_MAX_CONCURRENT_JOBS: u32 = 2;

/// Concurrency plan derived from configuration and system resources
#[derive(Debug, Clone, PartialEq)]
pub struct ConcurrencyPlan {
    /// Total logical CPU cores available
    pub total_cores: u32,
    /// Maximum number of engine child processes alive at once
    pub max_concurrent_jobs: u32,
    /// Threads handed to each engine invocation
    pub encoder_threads: u32,
}

impl ConcurrencyPlan {
    /// Derive a concurrency plan from configuration
    ///
    /// Uses the following rules:
    /// - Detects CPU cores via num_cpus
    /// - Explicit non-zero `max_concurrent_jobs` is used unchanged
    /// - Otherwise 2 slots, never more than the core count
    /// - Explicit non-zero `threads` is used unchanged, otherwise the cores are
    ///   split evenly across slots
    pub fn derive(cfg: &Config) -> Self {
        Self::derive_with_cores(cfg, num_cpus::get() as u32)
    }

    /// Same as [`ConcurrencyPlan::derive`] with an explicit core count
    pub fn derive_with_cores(cfg: &Config, total_cores: u32) -> Self {
        let total_cores = total_cores.max(1);

        let max_concurrent_jobs = if cfg.batch.max_concurrent_jobs > 0 {
            cfg.batch.max_concurrent_jobs
        } else {
            derive_max_jobs(total_cores)
        };

        let encoder_threads = if cfg.engine.threads > 0 {
            cfg.engine.threads
        } else {
            derive_threads(total_cores, max_concurrent_jobs)
        };

        Self {
            total_cores,
            max_concurrent_jobs,
            encoder_threads,
        }
    }
}

fn derive_max_jobs(cores: u32) -> u32 {
    DEFAULT_MAX_CONCURRENT_JOBS.min(cores).max(1)
}

fn derive_threads(cores: u32, jobs: u32) -> u32 {
    (cores / jobs.max(1)).max(1)
}

/// Public function to derive a concurrency plan from configuration
pub fn derive_plan(cfg: &Config) -> ConcurrencyPlan {
    ConcurrencyPlan::derive(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BatchConfig, EngineConfig};
    use proptest::prelude::*;

    fn config_with(max_jobs: u32, threads: u32) -> Config {
        Config {
            engine: EngineConfig {
                threads,
                ..EngineConfig::default()
            },
            batch: BatchConfig {
                max_concurrent_jobs: max_jobs,
                ..BatchConfig::default()
            },
            directories: Vec::new(),
        }
    }

    // *For any* core count with auto-derived settings, the pool SHALL be at
    // most 2 wide, never wider than the core count, and never empty.
    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_auto_derivation(cores in 0u32..256) {
            let plan = ConcurrencyPlan::derive_with_cores(&config_with(0, 0), cores);

            prop_assert!(plan.max_concurrent_jobs >= 1);
            prop_assert!(plan.max_concurrent_jobs <= DEFAULT_MAX_CONCURRENT_JOBS);
            prop_assert!(plan.max_concurrent_jobs <= plan.total_cores);
            prop_assert!(plan.encoder_threads >= 1);
            prop_assert!(plan.encoder_threads * plan.max_concurrent_jobs <= plan.total_cores.max(plan.max_concurrent_jobs));
        }

        #[test]
        fn prop_explicit_config_override(
            cores in 1u32..256,
            explicit_jobs in 1u32..16,
            explicit_threads in 1u32..64,
        ) {
            let plan = ConcurrencyPlan::derive_with_cores(
                &config_with(explicit_jobs, explicit_threads),
                cores,
            );

            prop_assert_eq!(plan.max_concurrent_jobs, explicit_jobs);
            prop_assert_eq!(plan.encoder_threads, explicit_threads);
        }
    }

    #[test]
    fn test_default_config_gives_two_slots() {
        let plan = ConcurrencyPlan::derive_with_cores(&Config::default(), 8);
        assert_eq!(plan.max_concurrent_jobs, 2);
        assert_eq!(plan.encoder_threads, 2);
    }

    #[test]
    fn test_single_core_host() {
        let plan = ConcurrencyPlan::derive_with_cores(&config_with(0, 0), 1);
        assert_eq!(plan.max_concurrent_jobs, 1);
        assert_eq!(plan.encoder_threads, 1);
    }
}
