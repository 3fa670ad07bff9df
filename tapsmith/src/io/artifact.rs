//! Artifact publication for finished tape images.
//!
//! The [`ArtifactStore`] trait decouples the pipeline from where tape images
//! end up (currently a local directory handing out `file://` URLs). Tests
//! use scripted stores that record publishes without touching shared storage.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::{info, instrument};

/// Downstream home for finished artifacts.
pub trait ArtifactStore {
    /// Copy `local` into the store and return a retrieval URL.
    ///
    /// Implementations must leave `local` untouched; the caller removes its
    /// staged copy only after publication is confirmed.
    fn publish(&self, local: &Path) -> Result<String>;
}

/// Store that copies artifacts into a directory and returns `file://` URLs.
#[derive(Debug, Clone)]
pub struct DirArtifactStore {
    dir: PathBuf,
}

impl DirArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ArtifactStore for DirArtifactStore {
    #[instrument(skip_all, fields(local = %local.display()))]
    fn publish(&self, local: &Path) -> Result<String> {
        let name = local
            .file_name()
            .ok_or_else(|| anyhow!("artifact path {} has no file name", local.display()))?;
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("create artifact dir {}", self.dir.display()))?;

        let dest = self.dir.join(name);
        fs::copy(local, &dest).with_context(|| {
            format!("copy artifact {} to {}", local.display(), dest.display())
        })?;

        let abs = dest
            .canonicalize()
            .with_context(|| format!("resolve artifact path {}", dest.display()))?;
        let url = format!("file://{}", abs.display());
        info!(url = %url, "artifact published");
        Ok(url)
    }
}
