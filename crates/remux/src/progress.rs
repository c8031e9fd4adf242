//! Progress extraction from the engine's diagnostic text.
//!
//! The engine prints free-form text. Two markers matter: `Duration: H:M:S.F`
//! once near the start and `time=H:M:S.F` on every status update. Lines that
//! carry neither are ignored.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

const DURATION_MARKER: &str = "Duration:";
const PROGRESS_MARKER: &str = "time=";

fn duration_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"Duration: (\d+):(\d+):(\d+\.\d+)").expect("duration pattern is valid")
    })
}

fn progress_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"time=(\d+):(\d+):(\d+\.\d+)").expect("progress pattern is valid")
    })
}

fn captures_to_seconds(re: &Regex, line: &str) -> f64 {
    let Some(caps) = re.captures(line) else {
        return 0.0;
    };
    let hours: f64 = caps[1].parse().unwrap_or(0.0);
    let minutes: f64 = caps[2].parse().unwrap_or(0.0);
    let seconds: f64 = caps[3].parse().unwrap_or(0.0);
    hours * 3600.0 + minutes * 60.0 + seconds
}

/// Total media length announced by a `Duration:` line, or 0.
pub fn parse_duration_line(line: &str) -> f64 {
    captures_to_seconds(duration_regex(), line)
}

/// Current encode position from a `time=` status line, or 0.
pub fn parse_progress_line(line: &str) -> f64 {
    captures_to_seconds(progress_regex(), line)
}

/// Last known position of one job. A zero total means "not yet known".
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub elapsed_secs: f64,
    pub total_secs: f64,
}

impl ProgressSnapshot {
    /// Fold one diagnostic line into the snapshot.
    ///
    /// Returns true when the line changed the snapshot.
    pub fn observe(&mut self, line: &str) -> bool {
        if line.contains(DURATION_MARKER) {
            let total = parse_duration_line(line);
            let changed = total != self.total_secs;
            self.total_secs = total;
            changed
        } else if line.contains(PROGRESS_MARKER) {
            let elapsed = parse_progress_line(line);
            let changed = elapsed != self.elapsed_secs;
            self.elapsed_secs = elapsed;
            changed
        } else {
            false
        }
    }

    /// Completed fraction in `[0, 1]`, once the total is known.
    pub fn fraction(&self) -> Option<f64> {
        if self.total_secs > 0.0 {
            Some((self.elapsed_secs / self.total_secs).clamp(0.0, 1.0))
        } else {
            None
        }
    }
}
