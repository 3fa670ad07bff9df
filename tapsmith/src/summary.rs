//! Summary stage: closing report for a packaged run.

use anyhow::{Result, anyhow};
use tracing::{debug, instrument};

use crate::core::session::Session;
use crate::io::prompt::render_summary_prompt;
use crate::io::transform::{TextTransform, TransformRequest, TransformTask};

/// Produce the Markdown session report.
///
/// Runs only after publication: the report links the published URL, so both
/// the final listing and `tap_public_url` must be present in the session.
#[instrument(skip_all)]
pub fn run_summary<T: TextTransform>(transform: &T, session: &Session) -> Result<String> {
    let code = session
        .current_code
        .as_deref()
        .ok_or_else(|| anyhow!("no final listing to summarize"))?;
    let url = session
        .tap_public_url
        .as_deref()
        .ok_or_else(|| anyhow!("no published tape URL to summarize"))?;

    let prompt = render_summary_prompt(code, &session.history_log(), url)?;
    let reply = transform.transform(&TransformRequest {
        task: TransformTask::Summarize,
        prompt,
    })?;

    let report = reply.trim();
    if report.is_empty() {
        return Err(anyhow!("summary produced no report"));
    }
    debug!(report_bytes = report.len(), "summary produced report");
    Ok(format!("{report}\n"))
}
