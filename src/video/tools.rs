use std::path::{Path, PathBuf};

use tracing::debug;

/// Resolve an external tool: an explicit path wins, otherwise look `name` up on PATH
pub fn locate(explicit: Option<&Path>, name: &str) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    match which::which(name) {
        Ok(path) => {
            debug!("Found {} at {}", name, path.display());
            Some(path)
        }
        Err(_) => None,
    }
}

/// Like [`locate`] but falls back to the bare name so the spawn itself reports the failure
pub fn locate_or_name(explicit: Option<&Path>, name: &str) -> PathBuf {
    locate(explicit, name).unwrap_or_else(|| PathBuf::from(name))
}

/// Keep only the last `max_lines` non-empty lines of a tool's stderr
pub fn stderr_tail(stderr: &[u8], max_lines: usize) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_path_wins() {
        let explicit = Path::new("/opt/ffmpeg/bin/ffmpeg");
        assert_eq!(locate(Some(explicit), "ffmpeg"), Some(explicit.to_path_buf()));
    }

    #[test]
    fn test_unknown_tool_falls_back_to_name() {
        let name = "reelsmith-no-such-tool";
        assert_eq!(locate(None, name), None);
        assert_eq!(locate_or_name(None, name), PathBuf::from(name));
    }

    #[test]
    fn test_stderr_tail() {
        let stderr = b"one\n\ntwo\nthree\n";
        assert_eq!(stderr_tail(stderr, 2), "two\nthree");
        assert_eq!(stderr_tail(stderr, 10), "one\ntwo\nthree");
        assert_eq!(stderr_tail(b"", 3), "");
    }
}
