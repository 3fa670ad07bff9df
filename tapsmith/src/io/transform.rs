//! Text-transform abstraction for the LLM collaborators.
//!
//! Extraction, correction, and summary are all the same shape: prompt text
//! in, reply text out, no structure promised. The [`TextTransform`] trait
//! decouples the stages from the actual backend (a configured CLI fed over
//! stdin). Tests use scripted transforms that return predetermined replies
//! without spawning processes.

use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::io::config::TransformConfig;
use crate::io::process::run_command_with_timeout;

/// Which pipeline stage a transform request serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformTask {
    Extract,
    Correct,
    Summarize,
}

impl TransformTask {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransformTask::Extract => "extract",
            TransformTask::Correct => "correct",
            TransformTask::Summarize => "summarize",
        }
    }
}

/// Parameters for a transform invocation.
#[derive(Debug, Clone)]
pub struct TransformRequest {
    pub task: TransformTask,
    /// Full prompt, including any embedded image data URLs.
    pub prompt: String,
}

/// Abstraction over the text-rewrite backend.
pub trait TextTransform {
    /// Run the collaborator and return its raw reply. Replies are not
    /// normalized here; each stage knows what hygiene its reply needs.
    fn transform(&self, request: &TransformRequest) -> Result<String>;
}

/// Transform that spawns the configured command, feeding the prompt on stdin
/// and taking the reply from stdout.
#[derive(Debug, Clone)]
pub struct CommandTransform {
    command: Vec<String>,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl CommandTransform {
    pub fn new(config: &TransformConfig) -> Self {
        Self {
            command: config.command.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            output_limit_bytes: config.output_limit_bytes,
        }
    }
}

impl TextTransform for CommandTransform {
    #[instrument(skip_all, fields(task = request.task.as_str(), prompt_bytes = request.prompt.len()))]
    fn transform(&self, request: &TransformRequest) -> Result<String> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| anyhow!("transform command is empty"))?;

        info!(program = %program, "starting transform");
        let mut cmd = Command::new(program);
        cmd.args(args);

        let output = run_command_with_timeout(
            cmd,
            Some(request.prompt.as_bytes()),
            self.timeout,
            self.output_limit_bytes,
        )
        .with_context(|| format!("run transform '{program}'"))?;

        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "transform failed");
            return Err(anyhow!(
                "transform '{program}' failed with status {:?}: {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }

        debug!(reply_bytes = output.stdout.len(), "transform completed");
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::process::ToolUnavailableError;

    fn transform(command: &[&str]) -> CommandTransform {
        CommandTransform::new(&TransformConfig {
            command: command.iter().map(ToString::to_string).collect(),
            timeout_secs: 5,
            output_limit_bytes: 10_000,
        })
    }

    fn request(prompt: &str) -> TransformRequest {
        TransformRequest {
            task: TransformTask::Correct,
            prompt: prompt.to_string(),
        }
    }

    /// The prompt goes in on stdin and the reply comes back from stdout.
    #[test]
    fn transform_pipes_prompt_through() {
        let reply = transform(&["cat"])
            .transform(&request("10 PRINT \"HI\"\n"))
            .expect("transform");
        assert_eq!(reply, "10 PRINT \"HI\"\n");
    }

    /// A non-zero exit is an error carrying the collaborator's stderr.
    #[test]
    fn transform_fails_on_nonzero_exit() {
        let err = transform(&["sh", "-c", "echo quota >&2; exit 3"])
            .transform(&request("x"))
            .unwrap_err();
        let text = err.to_string();
        assert!(text.contains("status"));
        assert!(text.contains("quota"));
    }

    /// A missing binary surfaces as the typed unavailable error.
    #[test]
    fn transform_reports_missing_tool() {
        let err = transform(&["tapsmith-no-such-transform"])
            .transform(&request("x"))
            .unwrap_err();
        assert!(err.downcast_ref::<ToolUnavailableError>().is_some());
    }
}
