//! ffmpeg command construction
//!
//! Builds the re-encode command: strip every inherited metadata key, stamp a
//! fresh title and comment, re-encode video with the configured profile and
//! copy audio through.

use crate::concurrency::ConcurrencyPlan;
use crate::config::EngineConfig;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

/// Codec and quality settings shared by every job of a run
#[derive(Debug, Clone, PartialEq)]
pub struct EngineProfile {
    /// Engine executable, either a bare name looked up on PATH or a full path
    pub program: PathBuf,
    pub video_codec: String,
    pub preset: String,
    pub crf: u32,
    pub threads: u32,
    pub audio_codec: String,
}

impl EngineProfile {
    /// Combine the configured profile with the resolved executable and the
    /// per-job thread budget from the concurrency plan.
    pub fn new(program: PathBuf, cfg: &EngineConfig, plan: &ConcurrencyPlan) -> Self {
        Self {
            program,
            video_codec: cfg.video_codec.clone(),
            preset: cfg.preset.clone(),
            crf: cfg.crf,
            threads: plan.encoder_threads,
            audio_codec: cfg.audio_codec.clone(),
        }
    }
}

/// Parameters for one engine invocation
#[derive(Debug, Clone)]
pub struct EngineParams {
    pub input_path: PathBuf,
    /// In-progress output; never the published name
    pub working_path: PathBuf,
    /// Container title
    pub title: String,
    /// Container comment
    pub comment: String,
}

/// Build the engine command with all required flags
///
/// stderr is piped for incremental reading; stdin and stdout are closed so the
/// engine never waits on a prompt.
pub fn build_engine_command(profile: &EngineProfile, params: &EngineParams) -> Command {
    let mut cmd = Command::new(&profile.program);

    cmd.arg("-i").arg(&params.input_path);

    // Drop all metadata inherited from the source before stamping ours
    cmd.arg("-map_metadata").arg("-1");
    cmd.arg("-metadata").arg(format!("title={}", params.title));
    cmd.arg("-metadata").arg(format!("comment={}", params.comment));

    cmd.arg("-c:v").arg(&profile.video_codec);
    cmd.arg("-preset").arg(&profile.preset);
    cmd.arg("-crf").arg(profile.crf.to_string());
    cmd.arg("-threads").arg(profile.threads.to_string());

    cmd.arg("-c:a").arg(&profile.audio_codec);

    cmd.arg("-y").arg(&params.working_path);

    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());

    cmd
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use proptest::prelude::*;
    use std::ffi::OsStr;

    /// Helper to convert Command args to a Vec of strings for easier testing
    fn get_command_args(cmd: &Command) -> Vec<String> {
        cmd.as_std()
            .get_args()
            .filter_map(|arg| arg.to_str().map(String::from))
            .collect()
    }

    /// Helper to check if args contain a flag with a specific value
    fn has_flag_with_value(args: &[String], flag: &str, value: &str) -> bool {
        args.windows(2).any(|pair| pair[0] == flag && pair[1] == value)
    }

    fn test_profile() -> EngineProfile {
        let plan = ConcurrencyPlan {
            total_cores: 8,
            max_concurrent_jobs: 2,
            encoder_threads: 2,
        };
        EngineProfile::new(PathBuf::from("ffmpeg"), &Config::default().engine, &plan)
    }

    fn path_strategy() -> impl Strategy<Value = String> {
        prop::string::string_regex("[a-zA-Z0-9_/.-]{1,50}").unwrap()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_engine_command_completeness(
            input_path in path_strategy(),
            working_path in path_strategy(),
            title in "VID_[0-9]{8}_[a-z0-9_]{1,20}",
            secs in 0u64..4_000_000_000,
        ) {
            let params = EngineParams {
                input_path: PathBuf::from(&input_path),
                working_path: PathBuf::from(&working_path),
                title: title.clone(),
                comment: format!("processed_{}", secs),
            };

            let cmd = build_engine_command(&test_profile(), &params);
            let args = get_command_args(&cmd);

            prop_assert_eq!(cmd.as_std().get_program(), OsStr::new("ffmpeg"));
            prop_assert!(has_flag_with_value(&args, "-i", &input_path));
            prop_assert!(has_flag_with_value(&args, "-map_metadata", "-1"));
            let title_arg = format!("title={}", title);
            let comment_arg = format!("comment=processed_{}", secs);
            prop_assert!(has_flag_with_value(&args, "-metadata", &title_arg));
            prop_assert!(has_flag_with_value(&args, "-metadata", &comment_arg));
            prop_assert!(has_flag_with_value(&args, "-y", &working_path));

            // Output path is always the final argument
            prop_assert_eq!(args.last().map(String::as_str), Some(working_path.as_str()));
        }
    }

    #[test]
    fn test_default_profile_flags() {
        let params = EngineParams {
            input_path: PathBuf::from("/in/CAM_20240101_000000_001.insv"),
            working_path: PathBuf::from("/out/VID_20240309_000000_001.mp4"),
            title: "VID_20240309_000000_001".to_string(),
            comment: "processed_1".to_string(),
        };
        let args = get_command_args(&build_engine_command(&test_profile(), &params));

        assert!(has_flag_with_value(&args, "-c:v", "libx264"));
        assert!(has_flag_with_value(&args, "-preset", "ultrafast"));
        assert!(has_flag_with_value(&args, "-crf", "30"));
        assert!(has_flag_with_value(&args, "-threads", "2"));
        assert!(has_flag_with_value(&args, "-c:a", "copy"));
    }

    #[test]
    fn test_metadata_strip_precedes_injection() {
        let params = EngineParams {
            input_path: PathBuf::from("in.insv"),
            working_path: PathBuf::from("out.mp4"),
            title: "t".to_string(),
            comment: "c".to_string(),
        };
        let args = get_command_args(&build_engine_command(&test_profile(), &params));

        let strip = args.iter().position(|a| a == "-map_metadata").unwrap();
        let inject = args.iter().position(|a| a == "-metadata").unwrap();
        assert!(strip < inject);
    }
}
