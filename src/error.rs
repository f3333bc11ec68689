use std::path::{Path, PathBuf};

use thiserror::Error;

/// Main error type for the reelsmith library
///
/// Every variant is terminal for the action that produced it. Nothing is
/// retried; the caller decides what to show the user.
#[derive(Error, Debug)]
pub enum ReelsmithError {
    #[error("Invalid input: {details}")]
    InvalidInput { details: String },

    #[error("Fetch failed: {reason}")]
    FetchFailed { reason: String },

    #[error("Failed to decode {}: {reason}", path.display())]
    DecodeFailed { path: PathBuf, reason: String },

    #[error("Failed to write {}: {source}", path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Packaging failed: {reason}")]
    PackagingFailed { reason: String },

    #[error("Trim failed: {reason}")]
    TrimFailed {
        reason: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Generic error: {0}")]
    Generic(String),
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration file: {path}")]
    ParseFailed { path: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },
}

/// Flat classification of [`ReelsmithError`], for callers that only branch on the kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    FetchFailed,
    DecodeFailed,
    WriteFailed,
    PackagingFailed,
    TrimFailed,
    Config,
    Generic,
}

/// Convenience type alias for Results using ReelsmithError
pub type Result<T> = std::result::Result<T, ReelsmithError>;

impl ReelsmithError {
    /// Create a generic error with a custom message
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }

    pub fn invalid_input<S: Into<String>>(details: S) -> Self {
        Self::InvalidInput { details: details.into() }
    }

    pub fn fetch_failed<S: Into<String>>(reason: S) -> Self {
        Self::FetchFailed { reason: reason.into() }
    }

    pub fn decode_failed<P: AsRef<Path>, S: Into<String>>(path: P, reason: S) -> Self {
        Self::DecodeFailed {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    pub fn write_failed<P: AsRef<Path>>(path: P, source: std::io::Error) -> Self {
        Self::WriteFailed {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn packaging_failed<S: Into<String>>(reason: S) -> Self {
        Self::PackagingFailed { reason: reason.into() }
    }

    /// Trim failure that never reached a process exit status
    pub fn trim_failed<S: Into<String>>(reason: S) -> Self {
        Self::TrimFailed {
            reason: reason.into(),
            stderr: None,
            exit_code: None,
        }
    }

    /// The flat kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput { .. } => ErrorKind::InvalidInput,
            Self::FetchFailed { .. } => ErrorKind::FetchFailed,
            Self::DecodeFailed { .. } => ErrorKind::DecodeFailed,
            Self::WriteFailed { .. } => ErrorKind::WriteFailed,
            Self::PackagingFailed { .. } => ErrorKind::PackagingFailed,
            Self::TrimFailed { .. } => ErrorKind::TrimFailed,
            Self::Config(_) => ErrorKind::Config,
            Self::Generic(_) => ErrorKind::Generic,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidInput { details } => {
                format!("Please check your input: {}", details)
            }
            Self::FetchFailed { .. } => {
                "Video download failed. Check that the URL points to a public post with a video.".to_string()
            }
            Self::DecodeFailed { path, .. } => {
                format!("Could not read '{}' as a video. Please upload an mp4, mov or avi file.", path.display())
            }
            Self::TrimFailed { stderr: Some(stderr), reason, .. } => {
                let last = stderr.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or(reason);
                format!("Could not cut the clip: {}", last.trim())
            }
            Self::Config(ConfigError::FileNotFound { path }) => {
                format!("Configuration file '{}' not found.", path)
            }
            _ => self.to_string(),
        }
    }
}
