use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    archive::ArchivePackager,
    config::Config,
    error::{ReelsmithError, Result},
    scratch::ScratchSpace,
    source::{fetcher, RemoteFetcher, SourceResolver},
    video::{ClipTrimmer, FrameDecoder, FrameExtractor, TimeRange, VideoInfo},
};

/// Caller-facing entry point that wires the pipeline components together
///
/// Each action runs one blocking chain on a tokio blocking worker:
/// 1. Source - fetch the remote post or store the uploaded bytes in scratch
/// 2. Work - decode frames or cut a clip into a second scratch directory
/// 3. Delivery - read the result back into memory, zipping it when asked
///
/// Every scratch artifact is scoped to the action and gone when it returns,
/// whether it succeeded or not.
#[derive(Clone)]
pub struct Workbench {
    scratch: ScratchSpace,
    resolver: Arc<SourceResolver>,
    extractor: Arc<FrameExtractor>,
    decoder: Arc<dyn FrameDecoder>,
    trimmer: ClipTrimmer,
    packager: ArchivePackager,
}

impl Workbench {
    /// Build a workbench with the fetcher and decoder selected by `config`
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let fetcher = fetcher::from_config(&config.fetch);
        let decoder = default_decoder(&config)?;
        Self::with_collaborators(&config, fetcher, decoder)
    }

    /// Build a workbench around explicit fetch and decode collaborators
    pub fn with_collaborators(
        config: &Config,
        fetcher: Arc<dyn RemoteFetcher>,
        decoder: Arc<dyn FrameDecoder>,
    ) -> Result<Self> {
        let scratch = ScratchSpace::new(&config.scratch.base_dir)?;
        debug!("Scratch base: {}", scratch.base_dir().display());

        Ok(Self {
            resolver: Arc::new(SourceResolver::new(
                scratch.clone(),
                fetcher,
                config.fetch.video_extensions.clone(),
            )),
            extractor: Arc::new(FrameExtractor::new(Arc::clone(&decoder), &config.frames)),
            decoder,
            trimmer: ClipTrimmer::new(&config.encoder),
            packager: ArchivePackager::new(&config.archive),
            scratch,
        })
    }

    /// Replace the clip trimmer, e.g. to point at a specific encoder binary
    pub fn with_trimmer(mut self, trimmer: ClipTrimmer) -> Self {
        self.trimmer = trimmer;
        self
    }

    pub fn scratch(&self) -> &ScratchSpace {
        &self.scratch
    }

    /// Download one video and return its bytes
    pub async fn download_remote(&self, url: &str) -> Result<Vec<u8>> {
        let url = url.to_string();
        self.run_blocking("download", move |bench| bench.download_blocking(&url)).await
    }

    /// Split an uploaded video into frames and return them as a zip archive
    pub async fn extract_frames(&self, video: Vec<u8>, name: &str) -> Result<Vec<u8>> {
        let name = name.to_string();
        self.run_blocking("frames", move |bench| bench.extract_frames_blocking(&video, &name)).await
    }

    /// Cut `range` out of an uploaded video and return the clip bytes
    pub async fn trim_clip(&self, video: Vec<u8>, name: &str, range: TimeRange) -> Result<Vec<u8>> {
        let name = name.to_string();
        self.run_blocking("trim", move |bench| {
            bench.trim_blocking(&video, &name, range, |clip| {
                std::fs::read(clip).map_err(|e| {
                    ReelsmithError::trim_failed(format!("cannot read clip {}: {}", clip.display(), e))
                })
            })
        })
        .await
    }

    /// Like [`trim_clip`](Self::trim_clip) but deliver the clip inside a zip archive
    pub async fn trim_clip_archive(&self, video: Vec<u8>, name: &str, range: TimeRange) -> Result<Vec<u8>> {
        let name = name.to_string();
        self.run_blocking("trim", move |bench| {
            bench.trim_blocking(&video, &name, range, |clip| bench.packager.pack_files([clip]))
        })
        .await
    }

    /// Read stream metadata of an uploaded video; used to bound a time range
    pub async fn probe(&self, video: Vec<u8>, name: &str) -> Result<VideoInfo> {
        let name = name.to_string();
        self.run_blocking("probe", move |bench| {
            let source = bench.resolver.resolve_local(&video, &name)?;
            let info = bench.decoder.probe(source.path())?;
            source.release();
            Ok(info)
        })
        .await
    }

    async fn run_blocking<T, F>(&self, action: &'static str, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Workbench) -> Result<T> + Send + 'static,
    {
        let bench = self.clone();
        tokio::task::spawn_blocking(move || work(&bench))
            .await
            .map_err(|e| ReelsmithError::generic(format!("{} worker failed: {}", action, e)))?
    }

    fn download_blocking(&self, url: &str) -> Result<Vec<u8>> {
        info!("🌐 Downloading {}", url.trim());
        let source = self.resolver.resolve_remote(url)?;
        let bytes = std::fs::read(source.path()).map_err(|e| {
            ReelsmithError::fetch_failed(format!("cannot read {}: {}", source.path().display(), e))
        })?;
        source.release();
        Ok(bytes)
    }

    fn extract_frames_blocking(&self, video: &[u8], name: &str) -> Result<Vec<u8>> {
        info!("🎞️  Extracting frames from {}", name);
        let source = self.resolver.resolve_local(video, name)?;
        let frames_dir = self.scratch.acquire_dir("frames")?;

        let frames = self.extractor.extract(source.path(), frames_dir.path())?;
        let archive = self.packager.pack_frames(&frames)?;

        frames_dir.release();
        source.release();
        info!("✅ {} frames packed", frames.len());
        Ok(archive)
    }

    fn trim_blocking<F>(&self, video: &[u8], name: &str, range: TimeRange, deliver: F) -> Result<Vec<u8>>
    where
        F: FnOnce(&Path) -> Result<Vec<u8>>,
    {
        let source = self.resolver.resolve_local(video, name)?;
        let clip_dir = self.scratch.acquire_dir("trim")?;

        let clip = self.trimmer.trim(source.path(), range, clip_dir.path())?;
        let bytes = deliver(&clip)?;

        clip_dir.release();
        source.release();
        info!("✅ Clip ready ({:.1} KB)", bytes.len() as f64 / 1024.0);
        Ok(bytes)
    }
}

#[cfg(not(feature = "ffmpeg"))]
fn default_decoder(config: &Config) -> Result<Arc<dyn FrameDecoder>> {
    Ok(Arc::new(crate::video::FfmpegDecoder::new(&config.encoder)))
}

#[cfg(feature = "ffmpeg")]
fn default_decoder(_config: &Config) -> Result<Arc<dyn FrameDecoder>> {
    Ok(Arc::new(crate::video::LibavDecoder::new()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::source::resolver::tests::StubFetcher;
    use crate::video::extractor::tests::SyntheticDecoder;
    use std::io::{Cursor, Read};
    use std::sync::atomic::Ordering;
    use tempfile::{tempdir, TempDir};
    use zip::ZipArchive;

    fn config(root: &TempDir) -> Config {
        let mut config = Config::default();
        config.scratch.base_dir = root.path().join("scratch");
        config
    }

    fn bench(root: &TempDir, frames: usize) -> (Workbench, Arc<StubFetcher>) {
        let fetcher = Arc::new(StubFetcher::new(vec![
            ("C9x.jpg", &b"thumbnail"[..]),
            ("C9x.mp4", &b"remote video"[..]),
        ]));
        let bench = Workbench::with_collaborators(
            &config(root),
            fetcher.clone(),
            Arc::new(SyntheticDecoder { frames }),
        )
        .unwrap();
        (bench, fetcher)
    }

    /// Entry names in archive order
    fn entry_names(archive: &[u8]) -> Vec<String> {
        let mut archive = ZipArchive::new(Cursor::new(archive)).unwrap();
        (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_extract_frames_archive_has_every_frame_in_order() {
        let root = tempdir().unwrap();
        let (bench, _) = bench(&root, 7);

        let archive = bench.extract_frames(b"video".to_vec(), "holiday.mp4").await.unwrap();

        let names = entry_names(&archive);
        let expected: Vec<String> = (0..7).map(|i| format!("frame{:04}.jpg", i)).collect();
        assert_eq!(names, expected);
        assert!(bench.scratch().residue().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_extract_frames_twice_gives_same_entries() {
        let root = tempdir().unwrap();
        let (bench, _) = bench(&root, 4);

        let first = bench.extract_frames(b"video".to_vec(), "a.mp4").await.unwrap();
        let second = bench.extract_frames(b"video".to_vec(), "a.mp4").await.unwrap();
        assert_eq!(entry_names(&first), entry_names(&second));
    }

    #[tokio::test]
    async fn test_empty_upload_fails_without_residue() {
        let root = tempdir().unwrap();
        let (bench, _) = bench(&root, 3);

        let err = bench.extract_frames(Vec::new(), "empty.mp4").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DecodeFailed);
        assert!(bench.scratch().residue().unwrap().is_empty());

        let err = bench.probe(Vec::new(), "empty.mp4").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DecodeFailed);
        assert!(bench.scratch().residue().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_download_empty_url_skips_fetcher() {
        let root = tempdir().unwrap();
        let (bench, fetcher) = bench(&root, 1);

        let err = bench.download_remote("").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_download_returns_video_bytes() {
        let root = tempdir().unwrap();
        let (bench, fetcher) = bench(&root, 1);

        let bytes = bench
            .download_remote("https://www.instagram.com/reel/C9x/")
            .await
            .unwrap();
        assert_eq!(bytes, b"remote video");
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert!(bench.scratch().residue().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_probe_reports_stream_info() {
        let root = tempdir().unwrap();
        let (bench, _) = bench(&root, 25);

        let info = bench.probe(b"video".to_vec(), "a.mp4").await.unwrap();
        assert_eq!(info.frame_count, 25);
        assert!((info.duration - 2.5).abs() < 1e-9);
        assert!(bench.scratch().residue().unwrap().is_empty());
    }

    #[cfg(unix)]
    mod trimming {
        use super::*;
        use std::os::unix::fs::PermissionsExt;
        use std::path::PathBuf;

        fn script(dir: &Path, body: &str) -> PathBuf {
            let path = dir.join("fake-ffmpeg");
            std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        #[tokio::test]
        async fn test_trim_clip_returns_encoder_output() {
            let root = tempdir().unwrap();
            let encoder = script(root.path(), "for last; do :; done\nprintf 'clip' > \"$last\"");
            let (bench, _) = bench(&root, 1);
            let bench = bench.with_trimmer(ClipTrimmer::with_encoder(encoder));
            let range = TimeRange::new(2.0, 5.0).unwrap();

            let clip = bench.trim_clip(b"video".to_vec(), "in.MOV", range).await.unwrap();
            assert_eq!(clip, b"clip");

            let archive = bench.trim_clip_archive(b"video".to_vec(), "in.MOV", range).await.unwrap();
            let mut archive = ZipArchive::new(Cursor::new(archive)).unwrap();
            let mut entry = archive.by_name("clip.mov").unwrap();
            let mut content = Vec::new();
            entry.read_to_end(&mut content).unwrap();
            assert_eq!(content, b"clip");

            assert!(bench.scratch().residue().unwrap().is_empty());
        }

        #[tokio::test]
        async fn test_failed_trim_leaves_no_residue() {
            let root = tempdir().unwrap();
            let encoder = script(root.path(), "echo 'boom' >&2\nexit 1");
            let (bench, _) = bench(&root, 1);
            let bench = bench.with_trimmer(ClipTrimmer::with_encoder(encoder));

            let err = bench
                .trim_clip(b"video".to_vec(), "in.mp4", TimeRange::new(0.0, 1.0).unwrap())
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::TrimFailed);
            assert!(bench.scratch().residue().unwrap().is_empty());
        }
    }
}
