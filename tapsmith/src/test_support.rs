//! Test-only scripted collaborators and session builders.
//!
//! Everything here is deterministic and in-memory: scripted doubles replay
//! queued responses in order and record every request, so tests can assert
//! both outcomes and the exact traffic that produced them.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};

use crate::core::session::Session;
use crate::io::artifact::ArtifactStore;
use crate::io::assembler::{AssembleRequest, AssemblerRun, TapAssembler};
use crate::io::process::ToolUnavailableError;
use crate::io::transform::{TextTransform, TransformRequest, TransformTask};

/// One queued assembler response.
#[derive(Debug, Clone)]
pub enum ScriptedAssemble {
    /// Observed run; writes placeholder bytes to the destination when
    /// `write_dest` is set (packaging checks that the file appears).
    Run {
        exit_code: i32,
        stderr: String,
        write_dest: bool,
    },
    /// Simulate a missing assembler binary.
    Unavailable,
}

impl ScriptedAssemble {
    /// Acceptance: zero exit, silent stderr, destination written.
    pub fn ok() -> Self {
        Self::Run {
            exit_code: 0,
            stderr: String::new(),
            write_dest: true,
        }
    }

    /// Acceptance reported without the destination appearing.
    pub fn ok_without_output() -> Self {
        Self::Run {
            exit_code: 0,
            stderr: String::new(),
            write_dest: false,
        }
    }

    /// Rejection: non-zero exit with a diagnostic on stderr.
    pub fn rejected(stderr: &str) -> Self {
        Self::Run {
            exit_code: 1,
            stderr: stderr.to_string(),
            write_dest: false,
        }
    }

    /// Rejection that leaves a partial destination file behind.
    pub fn rejected_with_partial(stderr: &str) -> Self {
        Self::Run {
            exit_code: 1,
            stderr: stderr.to_string(),
            write_dest: true,
        }
    }

    pub fn unavailable() -> Self {
        Self::Unavailable
    }
}

/// One recorded assembler call.
#[derive(Debug, Clone)]
pub struct RecordedAssemble {
    pub request: AssembleRequest,
    /// Source file contents captured at call time; the path is usually a
    /// scoped temp file that is gone by the time a test looks.
    pub source_text: Option<String>,
}

/// Assembler double that replays queued responses and records every call.
pub struct ScriptedAssembler {
    script: RefCell<VecDeque<ScriptedAssemble>>,
    calls: RefCell<Vec<RecordedAssemble>>,
}

impl ScriptedAssembler {
    pub fn new(script: Vec<ScriptedAssemble>) -> Self {
        Self {
            script: RefCell::new(script.into()),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<RecordedAssemble> {
        self.calls.borrow().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }
}

impl TapAssembler for ScriptedAssembler {
    fn assemble(&self, request: &AssembleRequest) -> Result<AssemblerRun> {
        self.calls.borrow_mut().push(RecordedAssemble {
            request: request.clone(),
            source_text: fs::read_to_string(&request.source).ok(),
        });

        let next = self
            .script
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("assembler script exhausted"))?;
        match next {
            ScriptedAssemble::Unavailable => Err(ToolUnavailableError {
                program: "bas2tap".to_string(),
            }
            .into()),
            ScriptedAssemble::Run {
                exit_code,
                stderr,
                write_dest,
            } => {
                if write_dest {
                    fs::write(&request.dest, b"scripted tape image")?;
                }
                Ok(AssemblerRun {
                    exit_code: Some(exit_code),
                    stdout: String::new(),
                    stderr,
                })
            }
        }
    }
}

/// Transform double that replays queued replies and records every request.
pub struct ScriptedTransform {
    replies: RefCell<VecDeque<String>>,
    requests: RefCell<Vec<TransformRequest>>,
}

impl ScriptedTransform {
    pub fn new(replies: Vec<&str>) -> Self {
        Self {
            replies: RefCell::new(replies.into_iter().map(ToString::to_string).collect()),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<TransformRequest> {
        self.requests.borrow().clone()
    }

    /// Which stages called the transform, in order.
    pub fn tasks(&self) -> Vec<TransformTask> {
        self.requests.borrow().iter().map(|r| r.task).collect()
    }
}

impl TextTransform for ScriptedTransform {
    fn transform(&self, request: &TransformRequest) -> Result<String> {
        self.requests.borrow_mut().push(request.clone());
        self.replies
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("transform script exhausted"))
    }
}

/// Artifact store double that returns a fixed URL or a scripted failure.
pub struct ScriptedStore {
    result: Result<String, String>,
    published: RefCell<Vec<PathBuf>>,
}

impl ScriptedStore {
    pub fn ok(url: &str) -> Self {
        Self {
            result: Ok(url.to_string()),
            published: RefCell::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
            published: RefCell::new(Vec::new()),
        }
    }

    pub fn published(&self) -> Vec<PathBuf> {
        self.published.borrow().clone()
    }
}

impl ArtifactStore for ScriptedStore {
    fn publish(&self, local: &Path) -> Result<String> {
        self.published.borrow_mut().push(local.to_path_buf());
        match &self.result {
            Ok(url) => Ok(url.clone()),
            Err(message) => Err(anyhow!("{message}")),
        }
    }
}

/// Session with a current listing installed, as if extraction had run.
pub fn session_with_code(code: &str) -> Session {
    let mut session = Session::new("run-test");
    session.current_code = Some(code.to_string());
    session
}
