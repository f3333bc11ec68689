//! # Video Processing Module
//!
//! Frame decoding, per-frame image extraction and stream-copy trimming.
//!
//! Decoding sits behind [`FrameDecoder`]. The default [`FfmpegDecoder`] pipes
//! raw frames out of the `ffmpeg` binary; building with the `ffmpeg` feature
//! adds an in-process decoder on top of libav.

pub mod decoder;
pub mod extractor;
pub mod tools;
pub mod trimmer;
pub mod types;

#[cfg(feature = "ffmpeg")]
pub mod libav;

pub use decoder::{FfmpegDecoder, FrameDecoder, FrameStream};
pub use extractor::{FrameExtractor, Frames};
pub use trimmer::ClipTrimmer;
pub use types::{Frame, FrameFile, TimeRange, VideoInfo, VideoSource};

#[cfg(feature = "ffmpeg")]
pub use libav::LibavDecoder;
