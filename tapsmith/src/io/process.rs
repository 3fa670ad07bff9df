//! Bounded execution of the external tools behind the pipeline seams.
//!
//! Both tools tapsmith drives (the tape assembler and the LLM command) run
//! through [`run_command_with_timeout`]: output is drained concurrently so a
//! chatty child cannot deadlock on a full pipe, capture is bounded so a
//! runaway child cannot exhaust memory, and a child that outlives its
//! wall-clock budget is killed. Timeouts and missing binaries surface as
//! `Err`, never as anything a caller could mistake for a tool verdict.

use std::fmt;
use std::io::{ErrorKind, Read, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// The configured external program does not exist on this system.
///
/// This is a fatal environment problem, not a property of the listing being
/// processed, so it gets a typed error that callers can pull out of an anyhow
/// chain with `downcast_ref` and turn into a distinct exit path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolUnavailableError {
    pub program: String,
}

impl fmt::Display for ToolUnavailableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "required tool '{}' was not found on this system; install it or fix the configured command",
            self.program
        )
    }
}

impl std::error::Error for ToolUnavailableError {}

/// Captured output of a finished child process.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Run a command to completion with a wall-clock budget and bounded capture.
///
/// `stdin`, when given, is written to the child before any output is read.
/// stdout and stderr are drained on dedicated threads so neither side can
/// fill its pipe and stall the child; at most `output_limit_bytes` of each
/// stream is kept. A child still running when `timeout` elapses is killed
/// and reported as an error. A spawn failure with [`ErrorKind::NotFound`] is
/// reported as [`ToolUnavailableError`].
#[instrument(skip_all, fields(program = %cmd.get_program().to_string_lossy(), timeout_secs = timeout.as_secs()))]
pub fn run_command_with_timeout(
    mut cmd: Command,
    stdin: Option<&[u8]>,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    let program = cmd.get_program().to_string_lossy().into_owned();

    if stdin.is_some() {
        cmd.stdin(Stdio::piped());
    } else {
        cmd.stdin(Stdio::null());
    }
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            error!("command not found");
            return Err(ToolUnavailableError { program }.into());
        }
        Err(err) => {
            return Err(err).with_context(|| format!("spawn '{program}'"));
        }
    };

    if let Some(input) = stdin {
        let mut child_stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("stdin was not piped"))?;
        child_stdin.write_all(input).context("write stdin")?;
    }

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;
    let stdout_handle = thread::spawn(move || drain_limited(stdout, output_limit_bytes));
    let stderr_handle = thread::spawn(move || drain_limited(stderr, output_limit_bytes));

    let status = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => status,
        None => {
            warn!("command still running at the deadline, killing it");
            child.kill().context("kill timed-out command")?;
            child.wait().context("wait after kill")?;
            return Err(anyhow!("'{program}' timed out after {}s", timeout.as_secs()));
        }
    };

    let (stdout, stdout_dropped) = join_reader(stdout_handle).context("join stdout reader")?;
    let (stderr, stderr_dropped) = join_reader(stderr_handle).context("join stderr reader")?;
    if stdout_dropped > 0 || stderr_dropped > 0 {
        warn!(stdout_dropped, stderr_dropped, "captured output hit the configured limit");
    }

    debug!(exit_code = ?status.code(), "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
    })
}

fn join_reader(handle: thread::JoinHandle<Result<(Vec<u8>, usize)>>) -> Result<(Vec<u8>, usize)> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

/// Read a stream to EOF, keeping at most `limit` bytes and counting the rest.
///
/// The stream is always drained in full so the child never blocks on a full
/// pipe; only the capture is bounded.
fn drain_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut kept = Vec::new();
    let mut dropped = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read child output")?;
        if n == 0 {
            break;
        }
        let keep = n.min(limit.saturating_sub(kept.len()));
        kept.extend_from_slice(&chunk[..keep]);
        dropped += n - keep;
    }

    Ok((kept, dropped))
}
