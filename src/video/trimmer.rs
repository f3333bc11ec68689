use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, info};

use crate::config::EncoderConfig;
use crate::error::{ReelsmithError, Result};
use crate::video::tools;
use crate::video::types::TimeRange;

/// Cuts a time range out of a video with ffmpeg stream copy (no re-encode)
#[derive(Debug, Clone)]
pub struct ClipTrimmer {
    encoder: Option<PathBuf>,
}

impl ClipTrimmer {
    pub fn new(config: &EncoderConfig) -> Self {
        Self {
            encoder: tools::locate(config.ffmpeg_path.as_deref(), "ffmpeg"),
        }
    }

    /// Use a specific encoder executable
    pub fn with_encoder<P: Into<PathBuf>>(encoder: P) -> Self {
        Self { encoder: Some(encoder.into()) }
    }

    /// `-i <input> -ss <start> -to <end> -c copy <output>`
    pub fn build_args(input: &Path, range: TimeRange, output: &Path) -> Vec<OsString> {
        vec![
            "-i".into(),
            input.as_os_str().to_owned(),
            "-ss".into(),
            format_seconds(range.start()).into(),
            "-to".into(),
            format_seconds(range.end()).into(),
            "-c".into(),
            "copy".into(),
            output.as_os_str().to_owned(),
        ]
    }

    /// Where the clip for `input` is written inside `out_dir`; keeps the source container
    pub fn output_path(input: &Path, out_dir: &Path) -> PathBuf {
        let extension = input
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty())
            .map(|ext| ext.to_lowercase())
            .unwrap_or_else(|| "mp4".to_string());
        out_dir.join(format!("clip.{}", extension))
    }

    /// Trim `input` to `range` and return the clip path inside `out_dir`.
    ///
    /// An `end` past the source duration is handed to the encoder as is; it
    /// clamps, so a clip shorter than requested is still a success.
    pub fn trim(&self, input: &Path, range: TimeRange, out_dir: &Path) -> Result<PathBuf> {
        if !input.exists() {
            return Err(ReelsmithError::invalid_input(format!(
                "video file does not exist: {}", input.display()
            )));
        }

        let encoder = self.encoder.as_ref()
            .ok_or_else(|| ReelsmithError::trim_failed("ffmpeg not found in PATH"))?;

        let output = Self::output_path(input, out_dir);
        let args = Self::build_args(input, range, &output);
        debug!("Running {} {:?}", encoder.display(), args);

        info!("✂️  Trimming {} to {:.3}s-{:.3}s", input.display(), range.start(), range.end());
        let result = Command::new(encoder)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| ReelsmithError::trim_failed(format!(
                "could not start {}: {}", encoder.display(), e
            )))?;

        if !result.status.success() {
            let stderr = tools::stderr_tail(&result.stderr, 5);
            return Err(ReelsmithError::TrimFailed {
                reason: format!("encoder exited with {}", result.status),
                stderr: (!stderr.is_empty()).then_some(stderr),
                exit_code: result.status.code(),
            });
        }

        let size = std::fs::metadata(&output).map(|meta| meta.len()).unwrap_or(0);
        if size == 0 {
            return Err(ReelsmithError::TrimFailed {
                reason: format!("encoder reported success but {} is missing or empty", output.display()),
                stderr: Some(tools::stderr_tail(&result.stderr, 5)).filter(|s| !s.is_empty()),
                exit_code: result.status.code(),
            });
        }

        info!("   Clip written: {} ({:.1} KB)", output.display(), size as f64 / 1024.0);
        Ok(output)
    }
}

/// Seconds with millisecond precision, the way ffmpeg accepts them
fn format_seconds(seconds: f64) -> String {
    format!("{:.3}", seconds)
}
