use std::ffi::OsString;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::EncoderConfig;
use crate::error::{ReelsmithError, Result};
use crate::video::tools;
use crate::video::types::{Frame, VideoInfo};

/// Opens video files and hands out their frames one at a time
pub trait FrameDecoder: Send + Sync {
    /// Read stream metadata without decoding
    fn probe(&self, path: &Path) -> Result<VideoInfo>;

    /// Start a sequential decode from the first frame
    fn open(&self, path: &Path) -> Result<Box<dyn FrameStream>>;
}

/// One pass over a video's frames in presentation order
pub trait FrameStream {
    fn info(&self) -> &VideoInfo;

    /// Next frame, or `Ok(None)` once the decoder reports end of stream
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

/// Decoder that pipes raw RGB24 frames out of the ffmpeg binary
#[derive(Debug, Clone)]
pub struct FfmpegDecoder {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    format: Option<FfprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

impl FfmpegDecoder {
    pub fn new(config: &EncoderConfig) -> Self {
        Self {
            ffmpeg: tools::locate_or_name(config.ffmpeg_path.as_deref(), "ffmpeg"),
            ffprobe: tools::locate_or_name(config.ffprobe_path.as_deref(), "ffprobe"),
        }
    }

    fn decode_args(path: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-v", "error", "-nostdin", "-noautorotate", "-i"]
            .iter()
            .map(OsString::from)
            .collect();
        args.push(path.as_os_str().to_owned());
        // passthrough keeps ffmpeg from duplicating or dropping frames
        args.extend(
            ["-map", "0:v:0", "-vsync", "passthrough", "-f", "rawvideo", "-pix_fmt", "rgb24", "-"]
                .iter()
                .map(OsString::from),
        );
        args
    }
}

impl Default for FfmpegDecoder {
    fn default() -> Self {
        Self::new(&EncoderConfig::default())
    }
}

impl FrameDecoder for FfmpegDecoder {
    fn probe(&self, path: &Path) -> Result<VideoInfo> {
        let output = Command::new(&self.ffprobe)
            .args([
                "-v", "error",
                "-select_streams", "v:0",
                "-show_entries",
                "stream=codec_name,width,height,avg_frame_rate,r_frame_rate,nb_frames,duration:format=duration",
                "-of", "json",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| ReelsmithError::decode_failed(path, format!("ffprobe could not be started: {}", e)))?;

        if !output.status.success() {
            return Err(ReelsmithError::decode_failed(
                path,
                format!("ffprobe failed: {}", tools::stderr_tail(&output.stderr, 3)),
            ));
        }

        let info = parse_ffprobe_json(&output.stdout)
            .map_err(|reason| ReelsmithError::decode_failed(path, reason))?;

        debug!(
            "Probed {}: {}x{} @ {:.3}fps, {} frames, {:.2}s ({})",
            path.display(), info.width, info.height, info.fps, info.frame_count, info.duration, info.codec
        );
        Ok(info)
    }

    fn open(&self, path: &Path) -> Result<Box<dyn FrameStream>> {
        let info = self.probe(path)?;

        let args = Self::decode_args(path);
        debug!("Running {} {:?}", self.ffmpeg.display(), args);

        let mut child = Command::new(&self.ffmpeg)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ReelsmithError::decode_failed(path, format!("ffmpeg could not be started: {}", e)))?;

        let stdout = child.stdout.take().ok_or_else(|| {
            ReelsmithError::decode_failed(path, "ffmpeg stdout was not captured")
        })?;

        // Drain stderr on the side so a chatty decoder can't block on a full pipe
        let stderr_drain = child.stderr.take().map(|mut stderr| {
            std::thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = stderr.read_to_end(&mut buf);
                buf
            })
        });

        info!("Decoding {} ({}x{} @ {:.2}fps)", path.display(), info.width, info.height, info.fps);

        Ok(Box::new(FfmpegFrameStream {
            path: path.to_path_buf(),
            info,
            child,
            stdout,
            stderr_drain,
            next_index: 0,
            finished: false,
        }))
    }
}

struct FfmpegFrameStream {
    path: PathBuf,
    info: VideoInfo,
    child: Child,
    stdout: ChildStdout,
    stderr_drain: Option<JoinHandle<Vec<u8>>>,
    next_index: usize,
    finished: bool,
}

impl FfmpegFrameStream {
    /// Fill `buf` completely; returns how many bytes were read before EOF
    fn read_full(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.stdout.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    /// Reap the process once stdout is exhausted
    fn finish(&mut self) -> Result<()> {
        self.finished = true;

        let status = self.child.wait()
            .map_err(|e| ReelsmithError::decode_failed(&self.path, format!("waiting for ffmpeg failed: {}", e)))?;
        let stderr = self.stderr_drain.take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        if !status.success() {
            return Err(ReelsmithError::decode_failed(
                &self.path,
                format!("ffmpeg exited with {}: {}", status, tools::stderr_tail(&stderr, 3)),
            ));
        }

        debug!("Decoder reached end of stream after {} frames", self.next_index);
        Ok(())
    }
}

impl FrameStream for FfmpegFrameStream {
    fn info(&self) -> &VideoInfo {
        &self.info
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.finished {
            return Ok(None);
        }

        let frame_len = self.info.rgb_frame_len();
        let mut buf = vec![0u8; frame_len];
        let filled = self.read_full(&mut buf)
            .map_err(|e| ReelsmithError::decode_failed(&self.path, format!("reading frame data failed: {}", e)))?;

        if filled == 0 {
            self.finish()?;
            return Ok(None);
        }
        if filled < frame_len {
            self.finished = true;
            return Err(ReelsmithError::decode_failed(
                &self.path,
                format!("truncated frame {}: {} of {} bytes", self.next_index, filled, frame_len),
            ));
        }

        let frame = Frame::from_rgb_bytes(self.next_index, self.info.width, self.info.height, buf)
            .ok_or_else(|| ReelsmithError::decode_failed(&self.path, "frame buffer size mismatch"))?;
        self.next_index += 1;
        Ok(Some(frame))
    }
}

impl Drop for FfmpegFrameStream {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            if let Err(e) = self.child.kill() {
                warn!("Failed to stop ffmpeg decoder: {}", e);
            }
            let _ = self.child.wait();
        }
    }
}

/// Parse a frame rate like `30000/1001` or `25`
fn parse_rate(rate: &str) -> Option<f64> {
    let value = match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => rate.trim().parse().ok()?,
    };
    (value.is_finite() && value > 0.0).then_some(value)
}

fn parse_ffprobe_json(json: &[u8]) -> std::result::Result<VideoInfo, String> {
    let probe: FfprobeOutput = serde_json::from_slice(json)
        .map_err(|e| format!("unreadable ffprobe output: {}", e))?;

    let stream = probe.streams.into_iter().next()
        .ok_or_else(|| "no video stream found".to_string())?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err("video stream has no dimensions".to_string()),
    };

    let fps = stream.avg_frame_rate.as_deref().and_then(parse_rate)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_rate))
        .ok_or_else(|| "video stream has no frame rate".to_string())?;

    let duration = stream.duration.as_deref()
        .or(probe.format.as_ref().and_then(|f| f.duration.as_deref()))
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0);

    let frame_count = stream.nb_frames.as_deref()
        .and_then(|n| n.trim().parse::<u64>().ok());

    let (frame_count, duration) = match (frame_count, duration) {
        (Some(count), Some(duration)) => (count, duration),
        (Some(count), None) => (count, count as f64 / fps),
        (None, Some(duration)) => ((duration * fps).round() as u64, duration),
        (None, None) => return Err("video stream has neither duration nor frame count".to_string()),
    };

    Ok(VideoInfo {
        width,
        height,
        fps,
        frame_count,
        duration,
        codec: stream.codec_name.unwrap_or_else(|| "unknown".to_string()),
    })
}
