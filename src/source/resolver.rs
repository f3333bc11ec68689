use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{ReelsmithError, Result};
use crate::scratch::{ScratchHandle, ScratchSpace};
use crate::source::fetcher::RemoteFetcher;
use crate::video::types::VideoSource;

/// Name used when an upload arrives without a usable file name
const FALLBACK_UPLOAD_NAME: &str = "upload.mp4";

/// A local video file plus the scratch artifact that keeps it alive
#[derive(Debug)]
pub struct ResolvedSource {
    path: PathBuf,
    scratch: Option<ScratchHandle>,
}

impl ResolvedSource {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the file lives in scratch storage owned by this value
    pub fn is_scratch(&self) -> bool {
        self.scratch.is_some()
    }

    /// Delete the backing scratch now rather than on drop
    pub fn release(self) {
        if let Some(scratch) = self.scratch {
            scratch.release();
        }
    }
}

/// Turns remote identifiers and uploads into local video files
pub struct SourceResolver {
    scratch: ScratchSpace,
    fetcher: Arc<dyn RemoteFetcher>,
    video_extensions: Vec<String>,
}

impl SourceResolver {
    pub fn new(scratch: ScratchSpace, fetcher: Arc<dyn RemoteFetcher>, video_extensions: Vec<String>) -> Self {
        Self {
            scratch,
            fetcher,
            video_extensions: video_extensions.into_iter().map(|ext| ext.to_lowercase()).collect(),
        }
    }

    pub fn resolve(&self, source: &VideoSource) -> Result<ResolvedSource> {
        match source {
            VideoSource::Remote { identifier } => self.resolve_remote(identifier),
            VideoSource::Local { path } => {
                if !path.is_file() {
                    return Err(ReelsmithError::invalid_input(format!(
                        "video file does not exist: {}", path.display()
                    )));
                }
                Ok(ResolvedSource { path: path.clone(), scratch: None })
            }
        }
    }

    /// Fetch a remote post into its own scratch directory
    pub fn resolve_remote(&self, identifier: &str) -> Result<ResolvedSource> {
        if identifier.trim().is_empty() {
            return Err(ReelsmithError::invalid_input("no URL provided"));
        }

        let dir = self.scratch.acquire_dir("remote")?;
        let manifest = self.fetcher.fetch(identifier, dir.path()).map_err(|e| match e {
            ReelsmithError::FetchFailed { .. } | ReelsmithError::InvalidInput { .. } => e,
            other => ReelsmithError::fetch_failed(other.to_string()),
        })?;
        debug!("Fetcher produced {} files: {:?}", manifest.len(), manifest);

        let mut videos = manifest.into_iter().filter(|path| self.is_video(path));
        let video = videos.next()
            .ok_or_else(|| ReelsmithError::fetch_failed("no video file among the downloaded media"))?;
        if let Some(extra) = videos.next() {
            warn!("Fetcher produced several videos, using {} and ignoring {}", video.display(), extra.display());
        }

        let size = std::fs::metadata(&video).map(|meta| meta.len()).map_err(|e| {
            ReelsmithError::fetch_failed(format!("downloaded file {} is unreadable: {}", video.display(), e))
        })?;
        if size == 0 {
            return Err(ReelsmithError::fetch_failed(format!(
                "downloaded file {} is empty", video.display()
            )));
        }

        info!("✅ Video downloaded: {} ({:.1} KB)", video.display(), size as f64 / 1024.0);
        Ok(ResolvedSource { path: video, scratch: Some(dir) })
    }

    /// Write uploaded bytes verbatim into a fresh scratch directory
    pub fn resolve_local(&self, bytes: &[u8], suggested_name: &str) -> Result<ResolvedSource> {
        let name = upload_file_name(suggested_name);
        let dir = self.scratch.acquire_dir("upload")?;
        let path = dir.path().join(name);

        std::fs::write(&path, bytes).map_err(|e| ReelsmithError::write_failed(&path, e))?;
        debug!("Stored upload {} ({} bytes)", path.display(), bytes.len());

        Ok(ResolvedSource { path, scratch: Some(dir) })
    }

    fn is_video(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.video_extensions.iter().any(|known| known.eq_ignore_ascii_case(ext)))
            .unwrap_or(false)
    }
}

/// Base name of an uploaded file, without any directory components
fn upload_file_name(suggested: &str) -> &str {
    suggested
        .rsplit(['/', '\\'])
        .next()
        .map(str::trim)
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .unwrap_or(FALLBACK_UPLOAD_NAME)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    /// Writes a fixed set of files and reports them as its manifest
    pub(crate) struct StubFetcher {
        pub files: Vec<(&'static str, &'static [u8])>,
        pub calls: AtomicUsize,
    }

    impl StubFetcher {
        pub(crate) fn new(files: Vec<(&'static str, &'static [u8])>) -> Self {
            Self { files, calls: AtomicUsize::new(0) }
        }
    }

    impl RemoteFetcher for StubFetcher {
        fn fetch(&self, _identifier: &str, target_dir: &Path) -> Result<Vec<PathBuf>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.files
                .iter()
                .map(|(name, content)| {
                    let path = target_dir.join(name);
                    std::fs::write(&path, content).unwrap();
                    Ok(path)
                })
                .collect()
        }
    }

    struct FailingFetcher;

    impl RemoteFetcher for FailingFetcher {
        fn fetch(&self, _identifier: &str, _target_dir: &Path) -> Result<Vec<PathBuf>> {
            Err(ReelsmithError::fetch_failed("login required"))
        }
    }

    /// Fails the way a scraper wrapper would when its own disk writes break
    struct DiskFullFetcher;

    impl RemoteFetcher for DiskFullFetcher {
        fn fetch(&self, _identifier: &str, target_dir: &Path) -> Result<Vec<PathBuf>> {
            let io = std::io::Error::new(std::io::ErrorKind::Other, "no space left on device");
            Err(ReelsmithError::write_failed(target_dir.join("C9x.mp4"), io))
        }
    }

    fn resolver(scratch: &ScratchSpace, fetcher: Arc<dyn RemoteFetcher>) -> SourceResolver {
        SourceResolver::new(scratch.clone(), fetcher, vec!["mp4".to_string(), "MOV".to_string()])
    }

    #[test]
    fn test_empty_identifier_never_reaches_fetcher() {
        let root = tempdir().unwrap();
        let scratch = ScratchSpace::new(root.path()).unwrap();
        let fetcher = Arc::new(StubFetcher::new(vec![("a.mp4", &b"video"[..])]));

        let err = resolver(&scratch, fetcher.clone()).resolve_remote("  ").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
        assert!(scratch.residue().unwrap().is_empty());
    }

    #[test]
    fn test_remote_picks_video_from_manifest() {
        let root = tempdir().unwrap();
        let scratch = ScratchSpace::new(root.path()).unwrap();
        let fetcher = Arc::new(StubFetcher::new(vec![
            ("post.jpg", &b"thumb"[..]),
            ("post.txt", &b"caption"[..]),
            ("post.MP4", &b"video"[..]),
        ]));

        let resolved = resolver(&scratch, fetcher).resolve_remote("C9x").unwrap();
        assert!(resolved.is_scratch());
        assert_eq!(resolved.path().file_name().unwrap(), "post.MP4");
        assert_eq!(scratch.residue().unwrap().len(), 1);

        drop(resolved);
        assert!(scratch.residue().unwrap().is_empty());
    }

    #[test]
    fn test_remote_without_video_fails_and_cleans_up() {
        let root = tempdir().unwrap();
        let scratch = ScratchSpace::new(root.path()).unwrap();
        let fetcher = Arc::new(StubFetcher::new(vec![("post.jpg", &b"thumb"[..])]));

        let err = resolver(&scratch, fetcher).resolve_remote("C9x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FetchFailed);
        assert!(scratch.residue().unwrap().is_empty());
    }

    #[test]
    fn test_remote_empty_video_fails() {
        let root = tempdir().unwrap();
        let scratch = ScratchSpace::new(root.path()).unwrap();
        let fetcher = Arc::new(StubFetcher::new(vec![("post.mp4", &b""[..])]));

        let err = resolver(&scratch, fetcher).resolve_remote("C9x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FetchFailed);
        assert!(scratch.residue().unwrap().is_empty());
    }

    #[test]
    fn test_remote_fetcher_error_propagates() {
        let root = tempdir().unwrap();
        let scratch = ScratchSpace::new(root.path()).unwrap();

        let err = resolver(&scratch, Arc::new(FailingFetcher)).resolve_remote("C9x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FetchFailed);
        assert!(scratch.residue().unwrap().is_empty());
    }

    #[test]
    fn test_any_fetcher_error_becomes_fetch_failure() {
        let root = tempdir().unwrap();
        let scratch = ScratchSpace::new(root.path()).unwrap();

        let err = resolver(&scratch, Arc::new(DiskFullFetcher)).resolve_remote("C9x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FetchFailed);
        assert!(err.to_string().contains("no space left on device"));
        assert!(scratch.residue().unwrap().is_empty());
    }

    #[test]
    fn test_upload_into_vanished_scratch_is_write_failure() {
        let root = tempdir().unwrap();
        let base = root.path().join("scratch");
        let scratch = ScratchSpace::new(&base).unwrap();
        let resolver = resolver(&scratch, Arc::new(FailingFetcher));

        std::fs::remove_dir_all(&base).unwrap();

        let err = resolver.resolve_local(b"video", "clip.mp4").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WriteFailed);
        assert!(!base.exists());
        let leftovers: Vec<_> = std::fs::read_dir(root.path()).unwrap().collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_local_upload_written_verbatim() {
        let root = tempdir().unwrap();
        let scratch = ScratchSpace::new(root.path()).unwrap();
        let resolver = resolver(&scratch, Arc::new(FailingFetcher));

        let resolved = resolver.resolve_local(b"\x00\x01bytes", "../../etc/holiday.mov").unwrap();
        assert_eq!(resolved.path().file_name().unwrap(), "holiday.mov");
        assert!(resolved.path().starts_with(scratch.base_dir()));
        assert_eq!(std::fs::read(resolved.path()).unwrap(), b"\x00\x01bytes");

        resolved.release();
        assert!(scratch.residue().unwrap().is_empty());
    }

    #[test]
    fn test_upload_file_name() {
        assert_eq!(upload_file_name("clip.mp4"), "clip.mp4");
        assert_eq!(upload_file_name("C:\\Users\\me\\clip.avi"), "clip.avi");
        assert_eq!(upload_file_name(""), FALLBACK_UPLOAD_NAME);
        assert_eq!(upload_file_name("dir/"), FALLBACK_UPLOAD_NAME);
    }

    #[test]
    fn test_resolve_local_path_in_place() {
        let root = tempdir().unwrap();
        let scratch = ScratchSpace::new(root.path().join("scratch")).unwrap();
        let resolver = resolver(&scratch, Arc::new(FailingFetcher));

        let video = root.path().join("mine.mp4");
        std::fs::write(&video, b"video").unwrap();

        let resolved = resolver.resolve(&VideoSource::Local { path: video.clone() }).unwrap();
        assert_eq!(resolved.path(), video);
        assert!(!resolved.is_scratch());

        let err = resolver
            .resolve(&VideoSource::Local { path: root.path().join("missing.mp4") })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
