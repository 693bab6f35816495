//! Clipcycle batch binary.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use clipcycle_batch::orchestrator::{BatchOrchestrator, RunOutcome};
use clipcycle_batch::single::{run_single, SingleRun};
use clipcycle_batch::BatchConfig;
use clipcycle_media::{check_ffmpeg, check_ffprobe, FfmpegEngine};

#[derive(Parser)]
#[command(name = "clipcycle", about = "Batch short-form video variant producer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process the next batch of folders, resuming from the state file
    Run,
    /// Process one folder directly, bypassing the batch state machine
    Single {
        /// Folder of clips to process
        folder: PathBuf,
        /// Intro audio track
        #[arg(long)]
        intro_audio: PathBuf,
        /// Outro video
        #[arg(long)]
        outro: PathBuf,
        /// Output file
        #[arg(long, default_value = "single_output.mp4")]
        output: PathBuf,
        /// Shuffle seed
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Maximum clips to select
        #[arg(long, default_value_t = 3)]
        max_clips: usize,
        /// Pass index to resolve the style from
        #[arg(long, default_value_t = 0)]
        pass: u32,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = BatchConfig::from_env();

    if let Err(e) = check_ffmpeg().and(check_ffprobe()) {
        error!("{e}");
        return ExitCode::FAILURE;
    }

    let mut engine = FfmpegEngine::new(config.render_target(), config.encoding.clone());
    if config.ffmpeg_timeout_secs > 0 {
        engine = engine.with_timeout(config.ffmpeg_timeout_secs);
    }
    let engine: Arc<dyn clipcycle_media::MediaEngine> = Arc::new(engine);

    match cli.command {
        Commands::Run => {
            let orchestrator = BatchOrchestrator::new(engine, config);
            match orchestrator.run().await {
                Ok(report) => {
                    info!(
                        pass_index = report.pass_index,
                        succeeded = report.succeeded.len(),
                        failed = report.failed.len(),
                        skipped = report.skipped.len(),
                        pass_completed = report.pass_completed,
                        "Run finished"
                    );
                    match report.outcome() {
                        RunOutcome::Failure => ExitCode::FAILURE,
                        _ => ExitCode::SUCCESS,
                    }
                }
                Err(e) => {
                    error!("Run aborted: {e}");
                    ExitCode::FAILURE
                }
            }
        }
        Commands::Single {
            folder,
            intro_audio,
            outro,
            output,
            seed,
            max_clips,
            pass,
        } => {
            let run = SingleRun {
                folder,
                intro_audio,
                outro,
                output,
                seed,
                max_clips,
                pass_index: pass,
            };
            match run_single(engine, &config, run).await {
                Ok(artifact) => {
                    info!(output = %artifact.path.display(), "Single run finished");
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    error!("Single run failed: {e}");
                    ExitCode::FAILURE
                }
            }
        }
    }
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("clipcycle=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}
