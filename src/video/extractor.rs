use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::{FrameConfig, FrameFormat};
use crate::error::{ReelsmithError, Result};
use crate::video::decoder::{FrameDecoder, FrameStream};
use crate::video::types::FrameFile;

/// Splits a video into one image file per decoded frame
pub struct FrameExtractor {
    decoder: Arc<dyn FrameDecoder>,
    format: FrameFormat,
    jpeg_quality: u8,
}

impl FrameExtractor {
    pub fn new(decoder: Arc<dyn FrameDecoder>, config: &FrameConfig) -> Self {
        Self {
            decoder,
            format: config.format,
            jpeg_quality: config.jpeg_quality,
        }
    }

    /// Start decoding `source`; each frame is written into `out_dir` as the
    /// iterator reaches it. Every call decodes from the first frame again.
    pub fn frames<'a>(&self, source: &Path, out_dir: &'a Path) -> Result<Frames<'a>> {
        if !source.exists() {
            return Err(ReelsmithError::invalid_input(format!(
                "video file does not exist: {}", source.display()
            )));
        }

        let stream = self.decoder.open(source)?;
        Ok(Frames {
            stream,
            out_dir,
            format: self.format,
            jpeg_quality: self.jpeg_quality,
            done: false,
        })
    }

    /// Decode every frame of `source` into `out_dir`, in decode order
    pub fn extract(&self, source: &Path, out_dir: &Path) -> Result<Vec<FrameFile>> {
        let frames = self.frames(source, out_dir)?;
        let expected = frames.info().frame_count;

        let files = frames.collect::<Result<Vec<_>>>()?;

        if files.len() as u64 != expected {
            // nb_frames is often an estimate; the decoder's count is authoritative
            debug!("Container reported {} frames, decoded {}", expected, files.len());
        }
        info!("Extracted {} frames from {}", files.len(), source.display());
        Ok(files)
    }
}

/// Lazy, single-pass sequence of persisted frames
pub struct Frames<'a> {
    stream: Box<dyn FrameStream>,
    out_dir: &'a Path,
    format: FrameFormat,
    jpeg_quality: u8,
    done: bool,
}

impl Frames<'_> {
    pub fn info(&self) -> &crate::video::types::VideoInfo {
        self.stream.info()
    }
}

impl Iterator for Frames<'_> {
    type Item = Result<FrameFile>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let result = match self.stream.next_frame() {
            Ok(Some(frame)) => frame.save(self.out_dir, self.format, self.jpeg_quality),
            Ok(None) => {
                self.done = true;
                return None;
            }
            Err(e) => Err(e),
        };

        if result.is_err() {
            self.done = true;
        }
        Some(result)
    }
}

impl std::iter::FusedIterator for Frames<'_> {}
