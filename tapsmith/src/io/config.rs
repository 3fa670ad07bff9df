//! Pipeline configuration stored in `tapsmith.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Pipeline configuration (TOML).
///
/// This file is intended to be edited by humans and must remain stable and
/// automatable. Missing fields default to sensible values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum validate/correct cycles before a run gives up on a listing.
    pub max_iterations: u32,

    pub assembler: AssemblerConfig,
    pub transform: TransformConfig,
    pub artifacts: ArtifactConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AssemblerConfig {
    /// Command that converts BASIC into a tape image; the source and
    /// destination paths are appended as the final two arguments, so flags
    /// belong here (e.g. `["bas2tap", "-q"]`).
    pub command: Vec<String>,

    /// Wall-clock budget for one assembler run in seconds.
    pub timeout_secs: u64,

    /// Truncate captured assembler output beyond this many bytes.
    pub output_limit_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TransformConfig {
    /// Command for the LLM collaborator; the prompt is piped to its stdin
    /// and the reply read from its stdout.
    pub command: Vec<String>,

    /// Wall-clock budget for one collaborator call in seconds.
    pub timeout_secs: u64,

    /// Truncate collaborator replies beyond this many bytes.
    pub output_limit_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ArtifactConfig {
    /// Directory the default artifact store publishes tape images into.
    pub dir: PathBuf,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            command: vec!["bas2tap".to_string()],
            timeout_secs: 60,
            output_limit_bytes: 100_000,
        }
    }
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            command: vec!["gemini".to_string()],
            timeout_secs: 5 * 60,
            output_limit_bytes: 200_000,
        }
    }
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("artifacts"),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            assembler: AssemblerConfig::default(),
            transform: TransformConfig::default(),
            artifacts: ArtifactConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(anyhow!("max_iterations must be > 0"));
        }
        if self.assembler.timeout_secs == 0 {
            return Err(anyhow!("assembler.timeout_secs must be > 0"));
        }
        if self.transform.timeout_secs == 0 {
            return Err(anyhow!("transform.timeout_secs must be > 0"));
        }
        if self.assembler.output_limit_bytes == 0 {
            return Err(anyhow!("assembler.output_limit_bytes must be > 0"));
        }
        if self.transform.output_limit_bytes == 0 {
            return Err(anyhow!("transform.output_limit_bytes must be > 0"));
        }
        if self.assembler.command.is_empty() || self.assembler.command[0].trim().is_empty() {
            return Err(anyhow!("assembler.command must be a non-empty array"));
        }
        if self.transform.command.is_empty() || self.transform.command[0].trim().is_empty() {
            return Err(anyhow!("transform.command must be a non-empty array"));
        }
        if self.artifacts.dir.as_os_str().is_empty() {
            return Err(anyhow!("artifacts.dir must not be empty"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `PipelineConfig::default()`.
pub fn load_config(path: &Path) -> Result<PipelineConfig> {
    if !path.exists() {
        let cfg = PipelineConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: PipelineConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &PipelineConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, PipelineConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("tapsmith.toml");
        let mut cfg = PipelineConfig::default();
        cfg.max_iterations = 5;
        cfg.assembler.command = vec!["bas2tap".to_string(), "-q".to_string()];
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("tapsmith.toml");
        fs::write(&path, "max_iterations = 7\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.max_iterations, 7);
        assert_eq!(cfg.assembler, AssemblerConfig::default());
    }

    #[test]
    fn zero_budget_is_rejected() {
        let cfg = PipelineConfig {
            max_iterations: 0,
            ..PipelineConfig::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("max_iterations"));
    }

    #[test]
    fn empty_assembler_command_is_rejected() {
        let mut cfg = PipelineConfig::default();
        cfg.assembler.command = vec![String::new()];
        assert!(cfg.validate().is_err());
    }
}
