//! # Reelsmith
//!
//! Download short social-media videos, split them into frames and cut clips
//! without re-encoding.
//!
//! Every action takes a video (a post URL or uploaded bytes), works in its
//! own scratch directory and hands back one in-memory result: the video
//! itself, a zip of its frames, or a stream-copied clip.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use reelsmith::{config::Config, video::TimeRange, Workbench};
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let bench = Workbench::new(Config::default())?;
//!
//! let video = bench.download_remote("https://www.instagram.com/reel/C9xYz12AbCd/").await?;
//! let frames_zip = bench.extract_frames(video.clone(), "reel.mp4").await?;
//! let clip = bench.trim_clip(video, "reel.mp4", TimeRange::new(2.0, 5.0)?).await?;
//!
//! std::fs::write("frames.zip", frames_zip)?;
//! std::fs::write("clip.mp4", clip)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`source`] - Remote fetchers and upload storage
//! - [`video`] - Frame decoding, extraction and clip trimming
//! - [`archive`] - In-memory zip packaging
//! - [`scratch`] - Per-action scratch directories that clean up after themselves
//! - [`workbench`] - The caller-facing facade tying the above together
//! - [`config`] - Configuration management
//!
//! ## Plugging In Collaborators
//!
//! Remote fetching and frame decoding are traits, so other scrapers or
//! decoders can be slotted in with [`Workbench::with_collaborators`]:
//!
//! ```rust,no_run
//! use std::path::{Path, PathBuf};
//! use std::sync::Arc;
//! use reelsmith::{config::Config, source::RemoteFetcher, video::FfmpegDecoder, Result, Workbench};
//!
//! struct LocalMirror;
//!
//! impl RemoteFetcher for LocalMirror {
//!     fn fetch(&self, identifier: &str, target_dir: &Path) -> Result<Vec<PathBuf>> {
//!         let target = target_dir.join(format!("{}.mp4", identifier));
//!         std::fs::copy(format!("/srv/mirror/{}.mp4", identifier), &target)
//!             .map_err(|e| reelsmith::ReelsmithError::fetch_failed(e.to_string()))?;
//!         Ok(vec![target])
//!     }
//! }
//!
//! # fn main() -> Result<()> {
//! let config = Config::default();
//! let _bench = Workbench::with_collaborators(
//!     &config,
//!     Arc::new(LocalMirror),
//!     Arc::new(FfmpegDecoder::new(&config.encoder)),
//! )?;
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod config;
pub mod error;
pub mod scratch;
pub mod source;
pub mod video;
pub mod workbench;

// Re-export commonly used types for convenience
pub use crate::{
    config::Config,
    error::{ErrorKind, ReelsmithError, Result},
    workbench::Workbench,
};
