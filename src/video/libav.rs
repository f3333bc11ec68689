//! In-process decoding through `ffmpeg-next`, enabled with the `ffmpeg` feature.

use std::path::{Path, PathBuf};

use ffmpeg_next as ffmpeg;
use ffmpeg::format::{context::Input, Pixel};
use ffmpeg::media::Type;
use ffmpeg::software::scaling::{context::Context as Scaler, flag::Flags};
use ffmpeg::util::frame::video::Video as VideoFrame;
use tracing::{debug, info};

use crate::error::{ReelsmithError, Result};
use crate::video::decoder::{FrameDecoder, FrameStream};
use crate::video::types::{Frame, VideoInfo};

/// Decoder linked against libavformat/libavcodec
#[derive(Debug, Default, Clone, Copy)]
pub struct LibavDecoder;

impl LibavDecoder {
    pub fn new() -> Result<Self> {
        ffmpeg::init().map_err(|e| ReelsmithError::generic(format!("libav init failed: {}", e)))?;
        Ok(Self)
    }

    fn open_input(path: &Path) -> Result<(Input, usize, ffmpeg::decoder::Video, VideoInfo)> {
        let failed = |e: ffmpeg::Error| ReelsmithError::decode_failed(path, e.to_string());

        let input = ffmpeg::format::input(&path).map_err(failed)?;
        let stream = input.streams().best(Type::Video)
            .ok_or_else(|| ReelsmithError::decode_failed(path, "no video stream found"))?;
        let stream_index = stream.index();

        let context = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
            .map_err(failed)?;
        let decoder = context.decoder().video().map_err(failed)?;

        let fps = f64::from(stream.avg_frame_rate());
        let fps = if fps.is_finite() && fps > 0.0 { fps } else { f64::from(stream.rate()) };
        if !(fps.is_finite() && fps > 0.0) {
            return Err(ReelsmithError::decode_failed(path, "video stream has no frame rate"));
        }

        let duration = if input.duration() > 0 {
            input.duration() as f64 / f64::from(ffmpeg::ffi::AV_TIME_BASE)
        } else {
            0.0
        };
        let frame_count = if stream.frames() > 0 {
            stream.frames() as u64
        } else {
            (duration * fps).round() as u64
        };
        let duration = if duration > 0.0 { duration } else { frame_count as f64 / fps };

        let info = VideoInfo {
            width: decoder.width(),
            height: decoder.height(),
            fps,
            frame_count,
            duration,
            codec: decoder.codec().map(|c| c.name().to_string()).unwrap_or_else(|| "unknown".to_string()),
        };
        if info.width == 0 || info.height == 0 {
            return Err(ReelsmithError::decode_failed(path, "video stream has no dimensions"));
        }

        Ok((input, stream_index, decoder, info))
    }
}

impl FrameDecoder for LibavDecoder {
    fn probe(&self, path: &Path) -> Result<VideoInfo> {
        Self::open_input(path).map(|(_, _, _, info)| info)
    }

    fn open(&self, path: &Path) -> Result<Box<dyn FrameStream>> {
        let (input, stream_index, decoder, info) = Self::open_input(path)?;

        let scaler = Scaler::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            Flags::BILINEAR,
        )
        .map_err(|e| ReelsmithError::decode_failed(path, e.to_string()))?;

        info!("Decoding {} in-process ({}x{} @ {:.2}fps)", path.display(), info.width, info.height, info.fps);

        Ok(Box::new(LibavFrameStream {
            path: path.to_path_buf(),
            info,
            input,
            stream_index,
            decoder,
            scaler,
            next_index: 0,
            eof_sent: false,
        }))
    }
}

struct LibavFrameStream {
    path: PathBuf,
    info: VideoInfo,
    input: Input,
    stream_index: usize,
    decoder: ffmpeg::decoder::Video,
    scaler: Scaler,
    next_index: usize,
    eof_sent: bool,
}

impl LibavFrameStream {
    fn failed(&self, e: ffmpeg::Error) -> ReelsmithError {
        ReelsmithError::decode_failed(&self.path, e.to_string())
    }

    /// Copy a converted frame row by row, dropping the stride padding
    fn to_frame(&self, rgb: &VideoFrame) -> Option<Frame> {
        let width = self.info.width as usize * 3;
        let stride = rgb.stride(0);
        let data = rgb.data(0);

        let mut packed = Vec::with_capacity(width * self.info.height as usize);
        for row in 0..self.info.height as usize {
            packed.extend_from_slice(&data[row * stride..row * stride + width]);
        }
        Frame::from_rgb_bytes(self.next_index, self.info.width, self.info.height, packed)
    }
}

impl FrameStream for LibavFrameStream {
    fn info(&self) -> &VideoInfo {
        &self.info
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            let mut decoded = VideoFrame::empty();
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                let mut rgb = VideoFrame::empty();
                self.scaler.run(&decoded, &mut rgb).map_err(|e| self.failed(e))?;

                let frame = self.to_frame(&rgb)
                    .ok_or_else(|| ReelsmithError::decode_failed(&self.path, "frame buffer size mismatch"))?;
                self.next_index += 1;
                return Ok(Some(frame));
            }

            if self.eof_sent {
                debug!("Decoder drained after {} frames", self.next_index);
                return Ok(None);
            }

            let next = self.input.packets().next().map(|(stream, packet)| (stream.index(), packet));
            match next {
                Some((index, packet)) if index == self.stream_index => {
                    self.decoder.send_packet(&packet).map_err(|e| self.failed(e))?;
                }
                Some(_) => {}
                None => {
                    self.decoder.send_eof().map_err(|e| self.failed(e))?;
                    self.eof_sent = true;
                }
            }
        }
    }
}
