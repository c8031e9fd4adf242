//! CLI entry point for insv-remux
//!
//! Loads configuration, resolves the engine, runs every directory pair and
//! prints a summary.

use anyhow::{Context, Result};
use clap::Parser;
use insv_remux::{
    resolve_engine, run_startup_checks, spawn_progress_reporter, BatchOrchestrator, BatchResult,
    Config, DirectoryPair,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

/// Re-encode finished 360° camera recordings in bulk
#[derive(Parser, Debug)]
#[command(name = "insv-remux")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(long, default_value = "insv-remux.toml")]
    config: PathBuf,

    /// Input directory (replaces the configured directory pairs)
    #[arg(short, long, requires = "output")]
    input: Option<PathBuf>,

    /// Output directory for --input
    #[arg(short, long, requires = "input")]
    output: Option<PathBuf>,

    /// Maximum number of engine processes at once
    #[arg(short, long)]
    jobs: Option<u32>,

    /// Skip the engine availability check
    #[arg(long, default_value = "false")]
    skip_checks: bool,

    /// Print the overall result as JSON
    #[arg(long, default_value = "false")]
    json: bool,

    /// Exit with a failure code if any job failed
    #[arg(long, default_value = "false")]
    strict: bool,

    /// Enable debug logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_secs()
        .init();
}

fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

fn print_summary(result: &BatchResult) {
    println!(
        "=== Total: {}/{} succeeded ===",
        result.succeeded, result.attempted
    );
    if result.unstable > 0 {
        println!("Skipped {} file(s) still being written", result.unstable);
    }
    println!("Elapsed: {}", format_elapsed(result.elapsed));
}

async fn run(args: &Args) -> Result<BatchResult> {
    let mut config = Config::load_or_default(&args.config)
        .with_context(|| format!("Failed to load config {}", args.config.display()))?;

    if let Some(jobs) = args.jobs {
        config.batch.max_concurrent_jobs = jobs;
    }
    if let (Some(input), Some(output)) = (&args.input, &args.output) {
        config.directories = vec![DirectoryPair::new(input, output)];
    }

    let engine = resolve_engine(&config);
    if args.skip_checks {
        log::warn!("Skipping startup checks (--skip-checks enabled)");
    } else {
        run_startup_checks(&engine).context("Startup checks failed")?;
    }

    let orchestrator = BatchOrchestrator::new(&config, engine);
    log::info!(
        "Running with {} concurrent job(s)",
        orchestrator.settings().max_concurrent_jobs
    );

    let reporter = spawn_progress_reporter(orchestrator.metrics(), Duration::from_millis(500));
    let result = orchestrator.run_all(&config.directory_pairs()).await;
    reporter.abort();

    Ok(result)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(&args).await {
        Ok(result) => {
            if args.json {
                match serde_json::to_string_pretty(&result) {
                    Ok(json) => println!("{}", json),
                    Err(e) => log::error!("Failed to serialize result: {}", e),
                }
            } else {
                print_summary(&result);
            }

            if args.strict && result.failed() > 0 {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            log::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
