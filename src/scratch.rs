//! # Scratch Storage
//!
//! Every action gets its own uniquely named directory or file under one
//! configured base directory. Handles delete what they own when dropped, so
//! intermediate artifacts disappear on success and on every error path alike.
//! Nothing here survives a crash cleanup-wise; a killed process can leave
//! residue under the base directory.

use std::path::{Path, PathBuf};

use tempfile::{Builder, TempDir, TempPath};
use tracing::{debug, warn};

use crate::error::{ReelsmithError, Result};

/// What kind of scratch artifact to create
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScratchKind {
    Dir,
    File,
}

/// Root of all scratch artifacts for one workbench
#[derive(Debug, Clone)]
pub struct ScratchSpace {
    base: PathBuf,
}

impl ScratchSpace {
    /// Use `base` as the scratch root, creating it if needed
    pub fn new<P: Into<PathBuf>>(base: P) -> Result<Self> {
        let base = base.into();
        std::fs::create_dir_all(&base).map_err(|e| ReelsmithError::write_failed(&base, e))?;
        Ok(Self { base })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base
    }

    /// Create a uniquely named artifact whose name starts with `label`
    pub fn acquire(&self, kind: ScratchKind, label: &str) -> Result<ScratchHandle> {
        let prefix = format!("{}-", label);
        let mut builder = Builder::new();
        builder.prefix(&prefix);

        let handle = match kind {
            ScratchKind::Dir => builder
                .tempdir_in(&self.base)
                .map(ScratchHandle::Dir),
            ScratchKind::File => builder
                .tempfile_in(&self.base)
                .map(|file| ScratchHandle::File(file.into_temp_path())),
        }
        .map_err(|e| ReelsmithError::write_failed(&self.base, e))?;

        debug!("Acquired scratch {:?}: {}", kind, handle.path().display());
        Ok(handle)
    }

    pub fn acquire_dir(&self, label: &str) -> Result<ScratchHandle> {
        self.acquire(ScratchKind::Dir, label)
    }

    /// Names of everything currently under the base directory
    pub fn residue(&self) -> Result<Vec<String>> {
        let unlistable = |e: std::io::Error| {
            ReelsmithError::generic(format!("cannot list scratch {}: {}", self.base.display(), e))
        };
        let entries = std::fs::read_dir(&self.base).map_err(unlistable)?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(unlistable)?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }
}

/// Exclusive owner of one scratch artifact; deleted recursively on drop
#[derive(Debug)]
pub enum ScratchHandle {
    Dir(TempDir),
    File(TempPath),
}

impl ScratchHandle {
    pub fn path(&self) -> &Path {
        match self {
            Self::Dir(dir) => dir.path(),
            Self::File(path) => path,
        }
    }

    /// Delete now instead of at drop; failures are only logged
    pub fn release(self) {
        let path = self.path().to_path_buf();
        let result = match self {
            Self::Dir(dir) => dir.close(),
            Self::File(file) => file.close(),
        };

        match result {
            Ok(()) => debug!("Released scratch {}", path.display()),
            Err(e) => warn!("Failed to remove scratch {}: {}", path.display(), e),
        }
    }
}
