//! Assembler abstraction for BASIC-to-tape conversion.
//!
//! The [`TapAssembler`] trait decouples validation and packaging from the
//! actual assembler binary (currently `bas2tap`). Tests use scripted
//! assemblers that return predetermined runs without spawning processes.

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument};

use crate::io::config::AssemblerConfig;
use crate::io::process::run_command_with_timeout;

/// Parameters for an assembler invocation.
#[derive(Debug, Clone)]
pub struct AssembleRequest {
    /// Path to the BASIC source file.
    pub source: PathBuf,
    /// Path where the assembler must write the tape image.
    pub dest: PathBuf,
}

/// Captured result of an assembler run.
///
/// This is an observation, not a judgement: a non-zero exit lives here, not
/// in `Err`, so callers can decide what rejection means for their stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblerRun {
    /// Process exit code; `None` when the process died to a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl AssemblerRun {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Abstraction over the external tape-assembly tool.
pub trait TapAssembler {
    /// Run the assembler for `request`. `Ok` means the tool executed and was
    /// observed; a missing binary or a hang is `Err`, a rejected listing is
    /// not.
    fn assemble(&self, request: &AssembleRequest) -> Result<AssemblerRun>;
}

/// Assembler that spawns the configured `bas2tap`-compatible command, passing
/// the source and destination paths as its final two arguments.
#[derive(Debug, Clone)]
pub struct Bas2tapAssembler {
    command: Vec<String>,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl Bas2tapAssembler {
    pub fn new(config: &AssemblerConfig) -> Self {
        Self {
            command: config.command.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            output_limit_bytes: config.output_limit_bytes,
        }
    }
}

impl TapAssembler for Bas2tapAssembler {
    #[instrument(skip_all, fields(source = %request.source.display(), dest = %request.dest.display()))]
    fn assemble(&self, request: &AssembleRequest) -> Result<AssemblerRun> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| anyhow!("assembler command is empty"))?;

        let mut cmd = Command::new(program);
        cmd.args(args).arg(&request.source).arg(&request.dest);

        let output = run_command_with_timeout(cmd, None, self.timeout, self.output_limit_bytes)
            .with_context(|| format!("run assembler '{program}'"))?;

        debug!(exit_code = ?output.status.code(), "assembler finished");
        Ok(AssemblerRun {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::process::ToolUnavailableError;

    fn request(temp: &tempfile::TempDir) -> AssembleRequest {
        AssembleRequest {
            source: temp.path().join("in.bas"),
            dest: temp.path().join("out.tap"),
        }
    }

    fn assembler(command: &[&str]) -> Bas2tapAssembler {
        Bas2tapAssembler::new(&AssemblerConfig {
            command: command.iter().map(ToString::to_string).collect(),
            timeout_secs: 5,
            output_limit_bytes: 10_000,
        })
    }

    /// A zero-exit run is observed as success with empty streams.
    #[test]
    fn assemble_observes_clean_exit() {
        let temp = tempfile::tempdir().expect("tempdir");
        let run = assembler(&["true"]).assemble(&request(&temp)).expect("run");
        assert!(run.success());
        assert!(run.stderr.is_empty());
    }

    /// A non-zero exit is an observation, not an error; stderr is captured.
    #[test]
    fn assemble_observes_rejection() {
        let temp = tempfile::tempdir().expect("tempdir");
        let run = assembler(&["sh", "-c", "echo bad line >&2; exit 1"])
            .assemble(&request(&temp))
            .expect("run");
        assert!(!run.success());
        assert_eq!(run.exit_code, Some(1));
        assert!(run.stderr.contains("bad line"));
    }

    /// A missing binary surfaces as the typed unavailable error.
    #[test]
    fn assemble_reports_missing_tool() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = assembler(&["tapsmith-no-such-assembler"])
            .assemble(&request(&temp))
            .unwrap_err();
        let unavailable = err
            .downcast_ref::<ToolUnavailableError>()
            .expect("typed error in chain");
        assert_eq!(unavailable.program, "tapsmith-no-such-assembler");
    }

    /// An empty configured command is rejected up front.
    #[test]
    fn assemble_rejects_empty_command() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = assembler(&[]).assemble(&request(&temp)).unwrap_err();
        assert!(err.to_string().contains("command is empty"));
    }
}
