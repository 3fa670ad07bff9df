//! Correction stage: feeds an assembler diagnostic back into the rewrite
//! collaborator.

use anyhow::{Result, anyhow};
use tracing::{debug, instrument, warn};

use crate::core::listing::{line_count, lines_without_numbers, normalize_listing};
use crate::io::prompt::render_correct_prompt;
use crate::io::transform::{TextTransform, TransformRequest, TransformTask};

/// Produce a full replacement for `listing` given the diagnostic from the
/// immediately preceding validation.
///
/// The diagnostic goes into the prompt verbatim. The reply is normalized
/// (fences and blank lines stripped) but never judged here; the next
/// validation decides whether the rewrite is acceptable.
#[instrument(skip_all, fields(diagnostic_bytes = diagnostic.len()))]
pub fn run_correction<T: TextTransform>(
    transform: &T,
    listing: &str,
    diagnostic: &str,
) -> Result<String> {
    let prompt = render_correct_prompt(listing, diagnostic)?;
    let reply = transform.transform(&TransformRequest {
        task: TransformTask::Correct,
        prompt,
    })?;

    let revised = normalize_listing(&reply);
    if revised.is_empty() {
        return Err(anyhow!("correction produced no code"));
    }
    let unnumbered = lines_without_numbers(&revised);
    if !unnumbered.is_empty() {
        warn!(lines = ?unnumbered, "corrected listing has lines without line numbers");
    }
    debug!(lines = line_count(&revised), "correction produced replacement listing");
    Ok(revised)
}
