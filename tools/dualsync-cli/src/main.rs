//! DualSync CLI: drive two synthetic players through the sync engine.
//!
//! Usage:
//!   dualsync simulate [OPTIONS]          Play both players and trace the sync
//!   dualsync export --output <PATH>      Encode the synchronized composite
//!   dualsync snapshot --output <PNG>     Save a side-by-side still

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use dualsync_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "dualsync",
    about = "Synchronized dual video playback and export",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to the user config location)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// The two synthetic players and their sync point.
#[derive(Args, Clone, Debug)]
pub struct PairArgs {
    /// Left video length in frames
    #[arg(long, default_value = "100")]
    pub left_frames: i64,

    /// Right video length in frames
    #[arg(long, default_value = "100")]
    pub right_frames: i64,

    /// Left frame interval (ms)
    #[arg(long, default_value = "40")]
    pub left_interval_ms: f64,

    /// Right frame interval (ms)
    #[arg(long, default_value = "40")]
    pub right_interval_ms: f64,

    /// Sync lag in frames; positive makes the right video lead
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    pub lag: i64,
}

#[derive(Subcommand)]
enum Commands {
    /// Play both videos in lockstep and print the sync trace
    Simulate {
        #[command(flatten)]
        pair: PairArgs,

        /// Simulated playback duration (ms)
        #[arg(long, default_value = "10000")]
        duration_ms: u64,

        /// Print every common position change
        #[arg(long)]
        trace: bool,
    },

    /// Export the synchronized composite to a video file
    Export {
        #[command(flatten)]
        pair: PairArgs,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Export only the leading (blended) video
        #[arg(long)]
        merge: bool,

        /// Stack the videos instead of placing them side by side
        #[arg(long)]
        vertical: bool,

        /// Cancel once this many frames were written
        #[arg(long)]
        cancel_at: Option<i64>,

        /// Write raw RGBA frames plus a JSON header instead of encoding with ffmpeg
        #[arg(long)]
        raw: bool,
    },

    /// Save a side-by-side still at the given native frames
    Snapshot {
        #[command(flatten)]
        pair: PairArgs,

        /// Left native frame
        #[arg(long, default_value = "0")]
        left_frame: i64,

        /// Right native frame
        #[arg(long, default_value = "0")]
        right_frame: i64,

        /// Output PNG path
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    dualsync_common::logging::init_logging(&config.logging);

    match cli.command {
        Commands::Simulate {
            pair,
            duration_ms,
            trace,
        } => commands::simulate::run(&config, pair, duration_ms, trace),
        Commands::Export {
            pair,
            output,
            merge,
            vertical,
            cancel_at,
            raw,
        } => {
            let options = commands::export::ExportOptions {
                output,
                merge,
                vertical,
                cancel_at,
                raw,
            };
            commands::export::run(config, pair, options).await
        }
        Commands::Snapshot {
            pair,
            left_frame,
            right_frame,
            output,
        } => commands::snapshot::run(&config, pair, left_frame, right_frame, output),
    }
}
