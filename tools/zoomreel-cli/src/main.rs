//! Zoomreel CLI: inspect recordings and export zoomed videos.
//!
//! Usage:
//!   zoomreel inspect <METADATA>            List keyframes and sample the timeline
//!   zoomreel plan <METADATA> --duration-ms Dry-run the export loop
//!   zoomreel export <VIDEO> <METADATA>     Render the zoomed export with ffmpeg
//!   zoomreel check                         Check for ffmpeg/ffprobe

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use zoomreel_common::config::AppConfig;
use zoomreel_project_model::CropRegion;

mod commands;

#[derive(Parser)]
#[command(
    name = "zoomreel",
    about = "Zoom-to-point screen recordings, exported frame by frame",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the keyframes of a recording and print interpolated views
    Inspect {
        /// Path to the recording metadata JSON
        metadata: PathBuf,

        /// Sample the timeline at this time (ms); repeatable
        #[arg(long = "at")]
        at: Vec<f64>,

        /// Crop region as x,y,width,height when the file has none
        #[arg(long, value_parser = commands::parse_crop)]
        crop: Option<CropRegion>,
    },

    /// Dry-run the export loop: frame count and per-step projections
    Plan {
        /// Path to the recording metadata JSON
        metadata: PathBuf,

        /// Source duration (ms); defaults to the recorded duration
        #[arg(long)]
        duration_ms: Option<u64>,

        /// Output frame rate
        #[arg(long)]
        fps: Option<u32>,

        /// Output width
        #[arg(long, requires = "height")]
        width: Option<u32>,

        /// Output height
        #[arg(long, requires = "width")]
        height: Option<u32>,

        /// Print every Nth step
        #[arg(long, default_value = "1")]
        every: u64,

        /// Crop region as x,y,width,height when the file has none
        #[arg(long, value_parser = commands::parse_crop)]
        crop: Option<CropRegion>,
    },

    /// Export a recording with its zoom keyframes applied
    Export {
        /// Path to the recorded video
        video: PathBuf,

        /// Path to the recording metadata JSON
        metadata: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output frame rate
        #[arg(long)]
        fps: Option<u32>,

        /// Output width
        #[arg(long, requires = "height")]
        width: Option<u32>,

        /// Output height
        #[arg(long, requires = "width")]
        height: Option<u32>,

        /// Crop region as x,y,width,height when the file has none
        #[arg(long, value_parser = commands::parse_crop)]
        crop: Option<CropRegion>,
    },

    /// Check that ffmpeg and ffprobe are available
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load();

    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    zoomreel_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Inspect { metadata, at, crop } => {
            commands::inspect::run(metadata, at, crop, &config)
        }
        Commands::Plan {
            metadata,
            duration_ms,
            fps,
            width,
            height,
            every,
            crop,
        } => commands::plan::run(
            metadata,
            duration_ms,
            fps,
            width.zip(height),
            every,
            crop,
            &config,
        ),
        Commands::Export {
            video,
            metadata,
            output,
            fps,
            width,
            height,
            crop,
        } => {
            commands::export::run(
                video,
                metadata,
                output,
                fps,
                width.zip(height),
                crop,
                &config,
            )
            .await
        }
        Commands::Check => commands::check::run(),
    }
}
