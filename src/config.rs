use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Main configuration for reelsmith
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where intermediate artifacts live
    pub scratch: ScratchConfig,

    /// Frame image output settings
    pub frames: FrameConfig,

    /// Archive packaging settings
    pub archive: ArchiveConfig,

    /// External encoder/decoder binaries
    pub encoder: EncoderConfig,

    /// Remote fetch settings
    pub fetch: FetchConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.display().to_string() })?;

        let config: Config = toml::from_str(&content)
            .map_err(|_| ConfigError::ParseFailed { path: path.display().to_string() })?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::InvalidValue {
                key: "config".to_string(),
                value: e.to_string()
            })?;

        std::fs::write(path, content)
            .map_err(|e| crate::error::ReelsmithError::write_failed(path, e))?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.scratch.validate()?;
        self.frames.validate()?;
        self.fetch.validate()?;
        Ok(())
    }
}

/// Scratch storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScratchConfig {
    /// Base directory under which every action gets its own unique directory
    pub base_dir: PathBuf,
}

impl Default for ScratchConfig {
    fn default() -> Self {
        Self {
            base_dir: std::env::temp_dir().join("reelsmith"),
        }
    }
}

impl ScratchConfig {
    fn validate(&self) -> Result<()> {
        if self.base_dir.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "scratch.base_dir".to_string(),
                value: String::new(),
            }.into());
        }

        Ok(())
    }
}

/// Image format used for extracted frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameFormat {
    Jpeg,
    Png,
}

impl FrameFormat {
    /// File extension written for this format
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }
}

/// Frame extraction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    /// Output image format
    pub format: FrameFormat,

    /// JPEG quality (1-100), ignored for PNG
    pub jpeg_quality: u8,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            format: FrameFormat::Jpeg,
            jpeg_quality: 95,
        }
    }
}

impl FrameConfig {
    fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ConfigError::InvalidValue {
                key: "frames.jpeg_quality".to_string(),
                value: self.jpeg_quality.to_string()
            }.into());
        }

        Ok(())
    }
}

/// How archive entries are compressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    Deflated,
    Stored,
}

/// Archive packaging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    pub compression: Compression,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            compression: Compression::Deflated,
        }
    }
}

/// Paths to the external ffmpeg tools; `None` means look them up on PATH
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
}

/// Which scraper fetches remote posts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FetchBackend {
    Instaloader,
    YtDlp,
}

impl FetchBackend {
    /// Executable name looked up on PATH when no explicit program is set
    pub fn default_program(&self) -> &'static str {
        match self {
            Self::Instaloader => "instaloader",
            Self::YtDlp => "yt-dlp",
        }
    }
}

/// Remote fetch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub backend: FetchBackend,

    /// Explicit path to the scraper executable
    pub program: Option<PathBuf>,

    /// Extensions (lowercase, without dot) accepted as the fetched video
    pub video_extensions: Vec<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            backend: FetchBackend::Instaloader,
            program: None,
            video_extensions: ["mp4", "mov", "m4v", "webm", "mkv"]
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }
}

impl FetchConfig {
    fn validate(&self) -> Result<()> {
        if self.video_extensions.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "fetch.video_extensions".to_string(),
                value: "[]".to_string()
            }.into());
        }

        if let Some(bad) = self.video_extensions.iter().find(|ext| ext.is_empty() || ext.starts_with('.')) {
            return Err(ConfigError::InvalidValue {
                key: "fetch.video_extensions".to_string(),
                value: bad.clone()
            }.into());
        }

        Ok(())
    }
}
