use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageBuffer, ImageEncoder, Rgb, RgbImage};
use serde::{Deserialize, Serialize};

use crate::config::FrameFormat;
use crate::error::{ReelsmithError, Result};

/// Represents a single decoded video frame
///
/// A thin wrapper around an RGB image buffer plus its position in decode
/// order. Frames carry no timestamp; the index is the only ordering.
#[derive(Clone, Debug)]
pub struct Frame {
    index: usize,
    buffer: RgbImage,
}

impl Frame {
    /// Create a new frame from an RGB image buffer
    pub fn new(index: usize, buffer: RgbImage) -> Self {
        Self { index, buffer }
    }

    /// Create a new frame with the given dimensions filled with the specified color
    pub fn new_filled(index: usize, width: u32, height: u32, color: [u8; 3]) -> Self {
        let buffer = ImageBuffer::from_pixel(width, height, Rgb(color));
        Self { index, buffer }
    }

    /// Create a frame from tightly packed RGB24 bytes
    pub fn from_rgb_bytes(index: usize, width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        ImageBuffer::from_raw(width, height, data)
            .map(|buffer| Self { index, buffer })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    /// Get the underlying image buffer
    pub fn as_image(&self) -> &RgbImage {
        &self.buffer
    }

    /// File name this frame is stored under, zero padded so that
    /// lexicographic order equals decode order (up to 10000 frames)
    pub fn file_name(&self, format: FrameFormat) -> String {
        format!("frame{:04}.{}", self.index, format.extension())
    }

    /// Write the frame into `dir` and return where it landed
    pub fn save(&self, dir: &Path, format: FrameFormat, jpeg_quality: u8) -> Result<FrameFile> {
        let path = dir.join(self.file_name(format));
        let file = std::fs::File::create(&path)
            .map_err(|e| ReelsmithError::write_failed(&path, e))?;
        let mut writer = BufWriter::new(file);

        let encoded = match format {
            FrameFormat::Jpeg => {
                JpegEncoder::new_with_quality(&mut writer, jpeg_quality).encode_image(&self.buffer)
            }
            FrameFormat::Png => PngEncoder::new(&mut writer).write_image(
                self.buffer.as_raw(),
                self.width(),
                self.height(),
                ColorType::Rgb8,
            ),
        };
        encoded.map_err(|e| {
            ReelsmithError::write_failed(&path, std::io::Error::new(std::io::ErrorKind::Other, e))
        })?;
        writer.flush().map_err(|e| ReelsmithError::write_failed(&path, e))?;

        Ok(FrameFile { index: self.index, path })
    }
}

/// A frame that has been persisted to scratch storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameFile {
    pub index: usize,
    pub path: PathBuf,
}

/// Where a video comes from before it is resolved to a local file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoSource {
    /// A post URL or bare shortcode handled by the remote fetcher
    Remote { identifier: String },
    /// A file already on disk
    Local { path: PathBuf },
}

/// A `[start, end)` range in seconds used for trimming
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeRange {
    start: f64,
    end: f64,
}

impl TimeRange {
    /// Requires `0 <= start < end`, both finite. `end` is not checked against
    /// any source duration; the encoder clamps it.
    pub fn new(start: f64, end: f64) -> Result<Self> {
        if !start.is_finite() || !end.is_finite() {
            return Err(ReelsmithError::invalid_input(format!(
                "time range must be finite, got {}..{}", start, end
            )));
        }
        if start < 0.0 {
            return Err(ReelsmithError::invalid_input(format!(
                "start must not be negative, got {}", start
            )));
        }
        if start >= end {
            return Err(ReelsmithError::invalid_input(format!(
                "start ({}) must be before end ({})", start, end
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Video stream metadata reported by a decoder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub frame_count: u64,
    /// Seconds; falls back to `frame_count / fps` when the container has none
    pub duration: f64,
    pub codec: String,
}

impl VideoInfo {
    /// Bytes in one packed RGB24 frame
    pub fn rgb_frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    /// Whole seconds, as used to bound a clip range selection
    pub fn whole_seconds(&self) -> u64 {
        self.duration.max(0.0).floor() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_frame_file_name_is_padded() {
        let frame = Frame::new_filled(7, 4, 4, [0, 0, 0]);
        assert_eq!(frame.file_name(FrameFormat::Jpeg), "frame0007.jpg");
        assert_eq!(frame.file_name(FrameFormat::Png), "frame0007.png");

        let late = Frame::new_filled(1234, 4, 4, [0, 0, 0]);
        assert_eq!(late.file_name(FrameFormat::Jpeg), "frame1234.jpg");
    }

    #[test]
    fn test_from_rgb_bytes_checks_length() {
        assert!(Frame::from_rgb_bytes(0, 2, 2, vec![0; 12]).is_some());
        assert!(Frame::from_rgb_bytes(0, 2, 2, vec![0; 11]).is_none());
    }

    #[test]
    fn test_save_writes_decodable_image() {
        let dir = tempdir().unwrap();
        let frame = Frame::new_filled(3, 16, 8, [200, 10, 10]);

        let jpeg = frame.save(dir.path(), FrameFormat::Jpeg, 90).unwrap();
        assert_eq!(jpeg.index, 3);
        assert_eq!(jpeg.path, dir.path().join("frame0003.jpg"));
        let decoded = image::open(&jpeg.path).unwrap().to_rgb8();
        assert_eq!(decoded.dimensions(), (16, 8));

        let png = frame.save(dir.path(), FrameFormat::Png, 90).unwrap();
        let decoded = image::open(&png.path).unwrap().to_rgb8();
        assert_eq!(decoded.get_pixel(0, 0).0, [200, 10, 10]);
    }

    #[test]
    fn test_time_range_validation() {
        assert!(TimeRange::new(2.0, 5.0).is_ok());
        assert!(TimeRange::new(0.0, 0.5).is_ok());
        assert!(TimeRange::new(-1.0, 5.0).is_err());
        assert!(TimeRange::new(5.0, 5.0).is_err());
        assert!(TimeRange::new(6.0, 5.0).is_err());
        assert!(TimeRange::new(0.0, f64::INFINITY).is_err());
        assert!(TimeRange::new(f64::NAN, 1.0).is_err());

        let range = TimeRange::new(2.0, 5.0).unwrap();
        assert_eq!(range.duration(), 3.0);
    }

    #[test]
    fn test_video_info_helpers() {
        let info = VideoInfo {
            width: 64,
            height: 48,
            fps: 10.0,
            frame_count: 105,
            duration: 10.5,
            codec: "h264".to_string(),
        };
        assert_eq!(info.rgb_frame_len(), 64 * 48 * 3);
        assert_eq!(info.whole_seconds(), 10);
    }
}
