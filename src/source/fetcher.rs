use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::{FetchBackend, FetchConfig};
use crate::error::{ReelsmithError, Result};
use crate::video::tools;

/// Downloads one post's media into a directory
pub trait RemoteFetcher: Send + Sync {
    /// Fetch `identifier` into `target_dir` and return every file produced.
    /// `target_dir` is empty and private to this call.
    fn fetch(&self, identifier: &str, target_dir: &Path) -> Result<Vec<PathBuf>>;
}

/// Build the fetcher selected in the configuration
pub fn from_config(config: &FetchConfig) -> Arc<dyn RemoteFetcher> {
    let program = tools::locate_or_name(config.program.as_deref(), config.backend.default_program());
    match config.backend {
        FetchBackend::Instaloader => Arc::new(InstaloaderFetcher::new(program)),
        FetchBackend::YtDlp => Arc::new(YtDlpFetcher::new(program)),
    }
}

/// Extract a post shortcode from an Instagram URL or accept a bare shortcode
pub fn shortcode_from_identifier(identifier: &str) -> Result<String> {
    let trimmed = identifier.trim();
    if trimmed.is_empty() {
        return Err(ReelsmithError::invalid_input("no URL provided"));
    }

    let without_query = trimmed
        .split(['?', '#'])
        .next()
        .unwrap_or(trimmed);
    let segments: Vec<&str> = without_query.split('/').filter(|s| !s.is_empty()).collect();

    let candidate = match segments.iter().position(|s| matches!(*s, "p" | "reel" | "reels" | "tv")) {
        Some(i) => segments.get(i + 1).copied(),
        None => segments.last().copied(),
    }
    .unwrap_or_default();

    let valid = !candidate.is_empty()
        && candidate.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid {
        return Err(ReelsmithError::invalid_input(format!(
            "cannot find a post shortcode in '{}'", trimmed
        )));
    }
    Ok(candidate.to_string())
}

fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| ReelsmithError::fetch_failed(format!("cannot list {}: {}", dir.display(), e)))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| ReelsmithError::fetch_failed(format!("cannot list {}: {}", dir.display(), e)))?
            .path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn run_scraper(mut command: Command, name: &str) -> Result<std::process::Output> {
    debug!("Running {:?}", command);
    let output = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| ReelsmithError::fetch_failed(format!("could not start {}: {}", name, e)))?;

    if !output.status.success() {
        return Err(ReelsmithError::fetch_failed(format!(
            "{} exited with {}: {}",
            name,
            output.status,
            tools::stderr_tail(&output.stderr, 3)
        )));
    }
    Ok(output)
}

/// Fetches a single post with the `instaloader` command line tool
#[derive(Debug, Clone)]
pub struct InstaloaderFetcher {
    program: PathBuf,
}

impl InstaloaderFetcher {
    pub fn new<P: Into<PathBuf>>(program: P) -> Self {
        Self { program: program.into() }
    }

    /// instaloader treats the directory as a format string
    fn escape_pattern(dir: &Path) -> String {
        dir.display().to_string().replace('{', "{{").replace('}', "}}")
    }
}

impl RemoteFetcher for InstaloaderFetcher {
    fn fetch(&self, identifier: &str, target_dir: &Path) -> Result<Vec<PathBuf>> {
        let shortcode = shortcode_from_identifier(identifier)?;
        info!("📥 Fetching post {} with instaloader", shortcode);

        let mut command = Command::new(&self.program);
        command
            .arg("--dirname-pattern")
            .arg(Self::escape_pattern(target_dir))
            .args([
                "--filename-pattern", "{shortcode}",
                "--no-pictures",
                "--no-captions",
                "--no-metadata-json",
                "--no-compress-json",
                "--quiet",
                "--",
            ])
            .arg(format!("-{}", shortcode));
        run_scraper(command, "instaloader")?;

        // target_dir is private to this call, so its contents are exactly what was fetched
        list_files(target_dir)
    }
}

/// Fetches a single post with `yt-dlp`, which reports the files it wrote
#[derive(Debug, Clone)]
pub struct YtDlpFetcher {
    program: PathBuf,
}

impl YtDlpFetcher {
    pub fn new<P: Into<PathBuf>>(program: P) -> Self {
        Self { program: program.into() }
    }

    fn url_for(identifier: &str) -> Result<String> {
        let trimmed = identifier.trim();
        if trimmed.contains("://") {
            return Ok(trimmed.to_string());
        }
        let shortcode = shortcode_from_identifier(trimmed)?;
        Ok(format!("https://www.instagram.com/reel/{}/", shortcode))
    }
}

impl RemoteFetcher for YtDlpFetcher {
    fn fetch(&self, identifier: &str, target_dir: &Path) -> Result<Vec<PathBuf>> {
        let url = Self::url_for(identifier)?;
        info!("📥 Fetching {} with yt-dlp", url);

        let mut command = Command::new(&self.program);
        command
            .args([
                "--no-playlist",
                "--no-progress",
                "--no-simulate",
                "--restrict-filenames",
                "-o", "%(id)s.%(ext)s",
                "--print", "after_move:filepath",
                "-P",
            ])
            .arg(target_dir)
            .arg(&url);
        let output = run_scraper(command, "yt-dlp")?;

        let manifest = String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(PathBuf::from)
            .collect();
        Ok(manifest)
    }
}
