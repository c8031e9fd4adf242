//! Stability checking module for verifying files are not being written to.
//!
//! Before a file enters the dispatch pool we verify it is no longer being
//! written (copied off the camera, for instance) by checking that its size
//! remains unchanged over a short wait.

use std::path::Path;
use std::time::Duration;
use tokio::time::sleep;

/// Result of a stability check on a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StabilityResult {
    /// File size remained unchanged during the stability window.
    Stable,
    /// File size changed during the stability window.
    Unstable {
        /// Size when first checked.
        initial_size: u64,
        /// Size after waiting.
        current_size: u64,
    },
}

impl StabilityResult {
    pub fn is_stable(&self) -> bool {
        matches!(self, StabilityResult::Stable)
    }
}

/// Sample the file size, wait, and sample again.
///
/// # Returns
/// * `Ok(StabilityResult::Stable)` if the file size is unchanged
/// * `Ok(StabilityResult::Unstable { .. })` if the file size changed
/// * `Err` if either sample cannot be read
pub async fn check_stability(
    path: &Path,
    wait_secs: u64,
) -> Result<StabilityResult, std::io::Error> {
    let initial_size = tokio::fs::metadata(path).await?.len();

    sleep(Duration::from_secs(wait_secs)).await;

    let current_size = tokio::fs::metadata(path).await?.len();

    Ok(compare_sizes(initial_size, current_size))
}

/// Returns true iff both samples succeed and agree.
///
/// Read failures (file vanished, permission denied) mean "not ready yet" and
/// are never surfaced as errors.
pub async fn is_stable(path: &Path, wait_secs: u64) -> bool {
    match check_stability(path, wait_secs).await {
        Ok(result) => result.is_stable(),
        Err(e) => {
            log::debug!("Stability probe could not read {}: {}", path.display(), e);
            false
        }
    }
}

/// Compare two file sizes and return the appropriate StabilityResult.
///
/// This is a pure function extracted for property testing.
#[inline]
pub fn compare_sizes(initial_size: u64, current_size: u64) -> StabilityResult {
    if initial_size == current_size {
        StabilityResult::Stable
    } else {
        StabilityResult::Unstable {
            initial_size,
            current_size,
        }
    }
}
