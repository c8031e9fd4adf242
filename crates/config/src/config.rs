//! Core configuration structures and loading logic

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Error type for configuration operations
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file
    Io(std::io::Error),
    /// TOML parsing error
    Parse(toml::de::Error),
    /// Values that parse but cannot work together
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read config file: {}", e),
            ConfigError::Parse(e) => write!(f, "Failed to parse config: {}", e),
            ConfigError::Invalid(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

/// Transcoding engine profile
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Explicit engine executable (resolved at startup if None)
    #[serde(default)]
    pub program: Option<PathBuf>,
    #[serde(default = "default_video_codec")]
    pub video_codec: String,
    #[serde(default = "default_preset")]
    pub preset: String,
    #[serde(default = "default_crf")]
    pub crf: u32,
    /// Encoder threads per child process
    #[serde(default = "default_threads")]
    pub threads: u32,
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,
}

fn default_video_codec() -> String {
    "libx264".to_string()
}

fn default_preset() -> String {
    "ultrafast".to_string()
}

fn default_crf() -> u32 {
    30
}

fn default_threads() -> u32 {
    2
}

fn default_audio_codec() -> String {
    "copy".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program: None,
            video_codec: default_video_codec(),
            preset: default_preset(),
            crf: default_crf(),
            threads: default_threads(),
            audio_codec: default_audio_codec(),
        }
    }
}

/// Batch dispatch configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchConfig {
    /// Maximum concurrent jobs per directory (0 = auto-derive)
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: u32,
    /// Seconds between the two size samples of the stability probe
    #[serde(default = "default_stability_wait_secs")]
    pub stability_wait_secs: u64,
    /// Extension of candidate inputs, matched case-insensitively
    #[serde(default = "default_input_extension")]
    pub input_extension: String,
    /// Extension of the in-progress engine output
    #[serde(default = "default_working_extension")]
    pub working_extension: String,
    /// Extension of the published artifact
    #[serde(default = "default_published_extension")]
    pub published_extension: String,
    /// Append random trailing bytes to published artifacts
    #[serde(default = "default_perturb_fingerprint")]
    pub perturb_fingerprint: bool,
}

fn default_max_concurrent_jobs() -> u32 {
    2
}

fn default_stability_wait_secs() -> u64 {
    2
}

fn default_input_extension() -> String {
    "insv".to_string()
}

fn default_working_extension() -> String {
    "mp4".to_string()
}

fn default_published_extension() -> String {
    "insv".to_string()
}

fn default_perturb_fingerprint() -> bool {
    true
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: default_max_concurrent_jobs(),
            stability_wait_secs: default_stability_wait_secs(),
            input_extension: default_input_extension(),
            working_extension: default_working_extension(),
            published_extension: default_published_extension(),
            perturb_fingerprint: default_perturb_fingerprint(),
        }
    }
}

impl BatchConfig {
    /// Reject settings that would make the working file and the published
    /// artifact share a name.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let working = self.working_extension.trim_start_matches('.');
        let published = self.published_extension.trim_start_matches('.');
        if working.eq_ignore_ascii_case(published) {
            return Err(ConfigError::Invalid(format!(
                "working_extension and published_extension must differ (both '{}')",
                published
            )));
        }
        Ok(())
    }
}

/// One input directory and the directory its outputs are published to
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DirectoryPair {
    pub input: PathBuf,
    pub output: PathBuf,
}

impl DirectoryPair {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub directories: Vec<DirectoryPair>,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Parses the config file and handles missing optional fields with defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Overrides the following values if environment variables are set:
    /// - REMUX_ENGINE_PATH -> engine.program
    /// - REMUX_ENGINE_THREADS -> engine.threads
    /// - REMUX_MAX_CONCURRENT_JOBS -> batch.max_concurrent_jobs
    /// - REMUX_STABILITY_WAIT_SECS -> batch.stability_wait_secs
    /// - REMUX_PERTURB_FINGERPRINT -> batch.perturb_fingerprint
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("REMUX_ENGINE_PATH") {
            if !val.trim().is_empty() {
                self.engine.program = Some(PathBuf::from(val));
            }
        }

        if let Ok(val) = env::var("REMUX_ENGINE_THREADS") {
            if let Ok(threads) = val.parse::<u32>() {
                self.engine.threads = threads;
            }
        }

        if let Ok(val) = env::var("REMUX_MAX_CONCURRENT_JOBS") {
            if let Ok(jobs) = val.parse::<u32>() {
                self.batch.max_concurrent_jobs = jobs;
            }
        }

        if let Ok(val) = env::var("REMUX_STABILITY_WAIT_SECS") {
            if let Ok(secs) = val.parse::<u64>() {
                self.batch.stability_wait_secs = secs;
            }
        }

        if let Ok(val) = env::var("REMUX_PERTURB_FINGERPRINT") {
            // Accept "true", "1", "yes" as true; "false", "0", "no" as false
            match val.to_lowercase().as_str() {
                "true" | "1" | "yes" => self.batch.perturb_fingerprint = true,
                "false" | "0" | "no" => self.batch.perturb_fingerprint = false,
                _ => {} // Invalid value, keep existing
            }
        }
    }

    /// Load configuration from file and apply environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Like [`Config::load`], but a missing file yields the defaults
    /// (still subject to environment overrides).
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = match Self::load_from_file(path) {
            Ok(config) => config,
            Err(ConfigError::Io(e)) if e.kind() == ErrorKind::NotFound => Config::default(),
            Err(e) => return Err(e),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.batch.validate()
    }

    /// Configured directory pairs, or the stock `a -> outputa`, `b -> outputb`
    /// layout when none are configured.
    pub fn directory_pairs(&self) -> Vec<DirectoryPair> {
        if self.directories.is_empty() {
            vec![
                DirectoryPair::new("a", "outputa"),
                DirectoryPair::new("b", "outputb"),
            ]
        } else {
            self.directories.clone()
        }
    }
}
