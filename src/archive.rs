//! # Archive Packaging
//!
//! Bundles files into a single zip archive built entirely in memory. Entry
//! order follows the caller, entry names are base names and must be unique,
//! and any unreadable input aborts the whole archive.

use std::collections::HashSet;
use std::io::{Cursor, Write};
use std::path::Path;

use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::config::{ArchiveConfig, Compression};
use crate::error::{ReelsmithError, Result};
use crate::video::types::FrameFile;

/// Packs ordered `(name, path)` entries into zip bytes
#[derive(Debug, Clone)]
pub struct ArchivePackager {
    compression: Compression,
}

impl ArchivePackager {
    pub fn new(config: &ArchiveConfig) -> Self {
        Self {
            compression: config.compression,
        }
    }

    fn options(&self) -> SimpleFileOptions {
        let method = match self.compression {
            Compression::Deflated => CompressionMethod::Deflated,
            Compression::Stored => CompressionMethod::Stored,
        };

        // Fixed metadata so identical input gives identical bytes
        SimpleFileOptions::default()
            .compression_method(method)
            .last_modified_time(DateTime::default())
            .unix_permissions(0o644)
    }

    /// Read each entry's file and store it under the base name of its `name`
    pub fn pack<I, N, P>(&self, entries: I) -> Result<Vec<u8>>
    where
        I: IntoIterator<Item = (N, P)>,
        N: AsRef<str>,
        P: AsRef<Path>,
    {
        let options = self.options();
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let mut seen = HashSet::new();

        for (name, path) in entries {
            let path = path.as_ref();
            let name = base_name(name.as_ref()).ok_or_else(|| {
                ReelsmithError::packaging_failed(format!("no usable entry name for {}", path.display()))
            })?;

            if !seen.insert(name.to_string()) {
                return Err(ReelsmithError::packaging_failed(format!("duplicate entry name: {}", name)));
            }

            let content = std::fs::read(path).map_err(|e| {
                ReelsmithError::packaging_failed(format!("cannot read {}: {}", path.display(), e))
            })?;

            writer.start_file(name, options)
                .map_err(|e| ReelsmithError::packaging_failed(format!("cannot add {}: {}", name, e)))?;
            writer.write_all(&content)
                .map_err(|e| ReelsmithError::packaging_failed(format!("cannot write {}: {}", name, e)))?;

            debug!("Packed {} ({} bytes)", name, content.len());
        }

        let bytes = writer.finish()
            .map_err(|e| ReelsmithError::packaging_failed(format!("cannot finish archive: {}", e)))?
            .into_inner();

        info!("📦 Archive ready: {} entries, {:.1} KB", seen.len(), bytes.len() as f64 / 1024.0);
        Ok(bytes)
    }

    /// Pack files under their own file names
    pub fn pack_files<I, P>(&self, paths: I) -> Result<Vec<u8>>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let entries = paths
            .into_iter()
            .map(|path| {
                let name = path
                    .as_ref()
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                (name, path)
            })
            .collect::<Vec<_>>();
        self.pack(entries)
    }

    /// Pack extracted frames in index order
    pub fn pack_frames(&self, frames: &[FrameFile]) -> Result<Vec<u8>> {
        let mut ordered: Vec<&FrameFile> = frames.iter().collect();
        ordered.sort_by_key(|frame| frame.index);
        self.pack_files(ordered.into_iter().map(|frame| frame.path.as_path()))
    }
}

impl Default for ArchivePackager {
    fn default() -> Self {
        Self::new(&ArchiveConfig::default())
    }
}

/// Last path component of `name`, accepting both separators
fn base_name(name: &str) -> Option<&str> {
    name.rsplit(['/', '\\'])
        .next()
        .filter(|base| !base.is_empty() && *base != "." && *base != "..")
}
