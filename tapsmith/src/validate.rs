//! Validation stage: scoped assembler run over the current listing.

use std::io::Write;

use anyhow::{Context, Result};
use tempfile::{Builder, NamedTempFile};
use tracing::{debug, instrument};

use crate::core::types::Verdict;
use crate::io::assembler::{AssembleRequest, AssemblerRun, TapAssembler};

/// Validate a listing by assembling it into a throwaway tape image.
///
/// The listing goes into a scoped temp `.bas` file and the assembler writes
/// a scoped temp `.tap`; both are removed on every exit path, success or
/// not. A missing assembler binary propagates as an error (see
/// [`crate::io::process::ToolUnavailableError`]) and is never folded into a
/// verdict.
#[instrument(skip_all, fields(listing_bytes = listing.len()))]
pub fn run_validation<A: TapAssembler>(assembler: &A, listing: &str) -> Result<Verdict> {
    let source = write_source_tempfile(listing)?;
    let dest = Builder::new()
        .prefix("tapsmith-")
        .suffix(".tap")
        .tempfile()
        .context("create scratch tape file")?;

    let run = assembler.assemble(&AssembleRequest {
        source: source.path().to_path_buf(),
        dest: dest.path().to_path_buf(),
    })?;

    let verdict = classify(&run);
    debug!(valid = verdict.is_valid(), "validation finished");
    Ok(verdict)
}

/// Write a listing to a scoped temp `.bas` file for one assembler run.
pub(crate) fn write_source_tempfile(listing: &str) -> Result<NamedTempFile> {
    let mut file = Builder::new()
        .prefix("tapsmith-")
        .suffix(".bas")
        .tempfile()
        .context("create scratch source file")?;
    file.write_all(listing.as_bytes())
        .context("write scratch source file")?;
    file.flush().context("flush scratch source file")?;
    Ok(file)
}

/// Classify an observed assembler run.
///
/// Acceptance is a zero exit with a silent error stream. Anything else is
/// `Invalid`, carrying the error-stream text verbatim, with the exit status
/// appended when it was non-zero so the message is never empty.
fn classify(run: &AssemblerRun) -> Verdict {
    let stderr = run.stderr.trim();
    if run.success() && stderr.is_empty() {
        return Verdict::Valid;
    }

    let mut message = stderr.to_string();
    if !run.success() {
        if !message.is_empty() {
            message.push('\n');
        }
        let status = match run.exit_code {
            Some(code) => code.to_string(),
            None => "signal".to_string(),
        };
        message.push_str(&format!("assembler exited with status {status}"));
    }
    Verdict::Invalid { message }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedAssemble, ScriptedAssembler};

    #[test]
    fn clean_run_is_valid() {
        let run = AssemblerRun {
            exit_code: Some(0),
            stdout: "Program: ready\n".to_string(),
            stderr: String::new(),
        };
        assert_eq!(classify(&run), Verdict::Valid);
    }

    #[test]
    fn nonzero_exit_is_invalid_with_verbatim_stderr() {
        let run = AssemblerRun {
            exit_code: Some(2),
            stdout: String::new(),
            stderr: "Nonsense in BASIC in line 10, statement 1\n".to_string(),
        };
        let Verdict::Invalid { message } = classify(&run) else {
            panic!("expected invalid");
        };
        assert!(message.starts_with("Nonsense in BASIC in line 10, statement 1"));
        assert!(message.ends_with("assembler exited with status 2"));
    }

    #[test]
    fn warnings_on_stderr_fail_validation_even_with_zero_exit() {
        let run = AssemblerRun {
            exit_code: Some(0),
            stdout: String::new(),
            stderr: "Warning: line 10 longer than screen\n".to_string(),
        };
        let Verdict::Invalid { message } = classify(&run) else {
            panic!("expected invalid");
        };
        assert_eq!(message, "Warning: line 10 longer than screen");
    }

    #[test]
    fn silent_nonzero_exit_still_produces_a_message() {
        let run = AssemblerRun {
            exit_code: Some(1),
            stdout: String::new(),
            stderr: String::new(),
        };
        let Verdict::Invalid { message } = classify(&run) else {
            panic!("expected invalid");
        };
        assert_eq!(message, "assembler exited with status 1");
    }

    #[test]
    fn signal_death_is_reported_as_such() {
        let run = AssemblerRun {
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
        };
        let Verdict::Invalid { message } = classify(&run) else {
            panic!("expected invalid");
        };
        assert!(message.contains("signal"));
    }

    /// The assembler sees the listing bytes on disk, at a path that no
    /// longer exists once validation returns.
    #[test]
    fn scratch_files_are_gone_after_validation() {
        let assembler = ScriptedAssembler::new(vec![ScriptedAssemble::ok()]);
        let verdict = run_validation(&assembler, "10 PRINT \"HI\"\n").expect("validate");
        assert!(verdict.is_valid());

        let calls = assembler.calls();
        assert_eq!(calls.len(), 1);
        assert!(!calls[0].request.source.exists(), "scratch source removed");
        assert!(!calls[0].request.dest.exists(), "scratch tape removed");
        assert_eq!(calls[0].source_text.as_deref(), Some("10 PRINT \"HI\"\n"));
    }

    /// Cleanup is RAII, so the scratch files are also gone after a rejection
    /// and after a tool failure.
    #[test]
    fn scratch_files_are_gone_on_failure_paths() {
        let assembler = ScriptedAssembler::new(vec![
            ScriptedAssemble::rejected("bad line 10"),
            ScriptedAssemble::unavailable(),
        ]);

        let verdict = run_validation(&assembler, "10 X\n").expect("validate");
        assert!(!verdict.is_valid());
        run_validation(&assembler, "10 X\n").unwrap_err();

        for call in assembler.calls() {
            assert!(!call.request.source.exists(), "scratch source removed");
            assert!(!call.request.dest.exists(), "scratch tape removed");
        }
    }

    #[test]
    fn empty_listing_is_not_special_cased() {
        let assembler = ScriptedAssembler::new(vec![ScriptedAssemble::rejected(
            "No BASIC lines found",
        )]);
        let verdict = run_validation(&assembler, "").expect("validate");
        assert!(!verdict.is_valid());
    }
}
