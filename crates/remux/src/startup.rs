//! Startup module
//!
//! Resolves the engine executable once per run and verifies that it starts.
//! The resolved path is handed to the orchestrator explicitly; nothing below
//! reads it back from global state.

use crate::config::Config;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

/// Error types for startup checks
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Engine not available: {0}")]
    EngineUnavailable(String),
}

/// File name of the engine on this platform
pub fn engine_file_name() -> &'static str {
    if cfg!(windows) {
        "ffmpeg.exe"
    } else {
        "ffmpeg"
    }
}

/// Pick the engine executable
///
/// In order:
/// 1. `engine.program` from configuration
/// 2. An engine shipped in the same directory as this binary
/// 3. The bare engine name, looked up on PATH at spawn time
pub fn resolve_engine(cfg: &Config) -> PathBuf {
    let bundle_dir = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf));
    resolve_engine_from(cfg, bundle_dir.as_deref())
}

/// [`resolve_engine`] with an explicit bundle directory
pub fn resolve_engine_from(cfg: &Config, bundle_dir: Option<&Path>) -> PathBuf {
    if let Some(program) = &cfg.engine.program {
        return program.clone();
    }

    if let Some(dir) = bundle_dir {
        let bundled = dir.join(engine_file_name());
        if bundled.is_file() {
            return bundled;
        }
    }

    PathBuf::from(engine_file_name())
}

/// Extract the version token from `ffmpeg -version` output
///
/// Handles both release ("ffmpeg version 7.1 ...") and git builds
/// ("ffmpeg version n7.1-12-gabcdef ...").
pub fn parse_engine_version(version_output: &str) -> Option<String> {
    let version_line = version_output
        .lines()
        .find(|line| line.to_lowercase().contains("ffmpeg version"))?;

    let version_part = version_line
        .to_lowercase()
        .split("ffmpeg version")
        .nth(1)?
        .split_whitespace()
        .next()?
        .to_string();

    Some(version_part.trim_start_matches('n').to_string())
}

/// Check that the engine starts by running `<engine> -version`
///
/// Returns the reported version, or "unknown" if the output could not be
/// parsed.
pub fn check_engine_available(program: &Path) -> Result<String, StartupError> {
    let output = Command::new(program).arg("-version").output().map_err(|e| {
        StartupError::EngineUnavailable(format!(
            "{} -version failed; is it bundled or in PATH? Error: {}",
            program.display(),
            e
        ))
    })?;

    if !output.status.success() {
        return Err(StartupError::EngineUnavailable(format!(
            "{} -version exited with {}",
            program.display(),
            output.status
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(parse_engine_version(&stdout).unwrap_or_else(|| "unknown".to_string()))
}

/// Run all startup checks for the resolved engine
pub fn run_startup_checks(program: &Path) -> Result<(), StartupError> {
    let version = check_engine_available(program)?;
    log::info!("Using engine {} (version {})", program.display(), version);
    Ok(())
}
