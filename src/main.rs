use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use reelsmith::{config::Config, video::TimeRange, ReelsmithError, Workbench};

#[derive(Parser)]
#[command(
    name = "reelsmith",
    version,
    about = "Download short videos, split them into frames and cut clips",
    long_about = "Reelsmith fetches a video from a social-media post, extracts every frame into a zip of images, or cuts a time range out of a video without re-encoding."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Configuration file (optional)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Base directory for scratch files, overrides the configuration
    #[arg(long, global = true)]
    scratch_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Download the video of a post
    Download {
        /// Post URL or shortcode
        url: String,

        /// Where to save the video
        #[arg(short, long, default_value = "video.mp4")]
        output: PathBuf,
    },

    /// Extract every frame of a video into a zip of images
    Frames {
        /// Video file
        video: PathBuf,

        /// Where to save the archive
        #[arg(short, long, default_value = "frames.zip")]
        output: PathBuf,
    },

    /// Cut a clip out of a video with stream copy
    Trim {
        /// Video file
        video: PathBuf,

        /// Start time in seconds
        #[arg(long)]
        start: f64,

        /// End time in seconds
        #[arg(long)]
        end: f64,

        /// Where to save the clip (or the archive with --zip)
        #[arg(short, long)]
        output: PathBuf,

        /// Deliver the clip inside a zip archive
        #[arg(long)]
        zip: bool,
    },

    /// Show stream information for a video
    Probe {
        /// Video file
        video: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose when set
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();

    info!("Starting reelsmith v{}", env!("CARGO_PKG_VERSION"));

    match run(cli).await {
        Ok(()) => Ok(()),
        Err(e) => {
            if let Some(err) = e.downcast_ref::<ReelsmithError>() {
                error!("{}", err.user_message());
            }
            Err(e)
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(config_path) => {
            info!("Loading configuration from {:?}", config_path);
            Config::from_file(config_path)?
        }
        None => Config::default(),
    };
    if let Some(scratch_dir) = cli.scratch_dir {
        config.scratch.base_dir = scratch_dir;
    }

    let bench = Workbench::new(config)?;

    match cli.command {
        Command::Download { url, output } => {
            let video = bench.download_remote(&url).await?;
            save(&output, video).await?;
        }
        Command::Frames { video, output } => {
            let (bytes, name) = load(&video).await?;
            let archive = bench.extract_frames(bytes, &name).await?;
            save(&output, archive).await?;
        }
        Command::Trim { video, start, end, output, zip } => {
            let range = TimeRange::new(start, end)?;
            let (bytes, name) = load(&video).await?;
            let result = if zip {
                bench.trim_clip_archive(bytes, &name, range).await?
            } else {
                bench.trim_clip(bytes, &name, range).await?
            };
            save(&output, result).await?;
        }
        Command::Probe { video } => {
            let (bytes, name) = load(&video).await?;
            let info = bench.probe(bytes, &name).await?;
            println!("codec:     {}", info.codec);
            println!("size:      {}x{}", info.width, info.height);
            println!("fps:       {:.3}", info.fps);
            println!("frames:    {}", info.frame_count);
            println!("duration:  {} seconds ({:.3}s)", info.whole_seconds(), info.duration);
        }
    }

    Ok(())
}

async fn load(path: &Path) -> Result<(Vec<u8>, String)> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {:?}", path))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok((bytes, name))
}

async fn save(path: &Path, bytes: Vec<u8>) -> Result<()> {
    let len = bytes.len();
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| ReelsmithError::write_failed(path, e))?;
    info!("Saved {:?} ({:.1} KB)", path, len as f64 / 1024.0);
    Ok(())
}
