//! Session persistence under the per-run directory.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::core::session::Session;

/// Canonical paths for one pipeline run under `<root>/.tapsmith/`.
#[derive(Debug, Clone)]
pub struct RunPaths {
    /// Per-run working directory (`<root>/.tapsmith/runs/<run-id>`).
    pub run_dir: PathBuf,
    /// Persisted session record.
    pub session_path: PathBuf,
    /// Last candidate listing, kept for inspection when a run gives up.
    pub listing_path: PathBuf,
    /// Staging location for the packaged tape image before publication.
    pub tap_stage_path: PathBuf,
}

impl RunPaths {
    pub fn new(root: &Path, run_id: &str) -> Self {
        let run_dir = root.join(".tapsmith").join("runs").join(run_id);
        Self {
            session_path: run_dir.join("session.json"),
            listing_path: run_dir.join("listing.bas"),
            tap_stage_path: run_dir.join(format!("{run_id}.tap")),
            run_dir,
        }
    }
}

/// Load a session record from disk.
pub fn load_session(path: &Path) -> Result<Session> {
    debug!(path = %path.display(), "loading session");
    let contents =
        fs::read_to_string(path).with_context(|| format!("read session {}", path.display()))?;
    let session: Session = serde_json::from_str(&contents)
        .with_context(|| format!("parse session {}", path.display()))?;
    Ok(session)
}

/// Atomically write a session record to disk (temp file + rename).
pub fn save_session(path: &Path, session: &Session) -> Result<()> {
    debug!(path = %path.display(), run_id = %session.run_id, "writing session");
    let mut buf = serde_json::to_string_pretty(session)?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("session path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp session {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace session {}", path.display()))?;
    Ok(())
}
