//! Typed session state threaded through every pipeline stage.
//!
//! One pipeline run owns one [`Session`]. Stages receive it by `&mut` and
//! there are no concurrent writers, so "exactly one current code buffer" is
//! enforced by the type rather than by key discipline in a shared map.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One uploaded listing page, held as clean re-encoded base64.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePart {
    pub mime_type: String,
    pub b64: String,
}

impl ImagePart {
    /// Render as a `data:` URL for embedding in a prompt.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.b64)
    }
}

/// Where the initial listing came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingSource {
    Text,
    Images,
    Both,
}

impl ListingSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingSource::Text => "text",
            ListingSource::Images => "images",
            ListingSource::Both => "both",
        }
    }
}

/// A timestamped entry in the session history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: SessionEvent,
}

/// Notable events across one pipeline run, in order of occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    ImagesReceived { count: usize },
    CodeExtracted { source: ListingSource, lines: usize },
    ValidationPassed { iteration: u32 },
    ValidationFailed { iteration: u32, message: String },
    CorrectionApplied { iteration: u32, lines: usize },
    BudgetExhausted { iterations: u32 },
    TapCreated { path: PathBuf },
    TapPublished { url: String },
}

impl SessionEvent {
    /// One-line description for the session log.
    fn describe(&self) -> String {
        match self {
            SessionEvent::ImagesReceived { count } => {
                format!("received {count} listing image(s)")
            }
            SessionEvent::CodeExtracted { source, lines } => {
                format!("extracted {lines} line(s) of BASIC from {}", source.as_str())
            }
            SessionEvent::ValidationPassed { iteration } => {
                format!("iteration {iteration}: assembler accepted the listing")
            }
            SessionEvent::ValidationFailed { iteration, message } => {
                let first = message.lines().next().unwrap_or("(no diagnostic)");
                format!("iteration {iteration}: assembler rejected the listing: {first}")
            }
            SessionEvent::CorrectionApplied { iteration, lines } => {
                format!("iteration {iteration}: applied corrected listing ({lines} line(s))")
            }
            SessionEvent::BudgetExhausted { iterations } => {
                format!("gave up after {iterations} iteration(s) without a clean listing")
            }
            SessionEvent::TapCreated { path } => {
                format!("created tape image at {}", path.display())
            }
            SessionEvent::TapPublished { url } => format!("published tape image to {url}"),
        }
    }
}

/// Cross-stage state for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    /// Listing text supplied directly by the user, with any surrounding
    /// magazine prose still attached.
    pub source_text: Option<String>,
    /// Uploaded listing pages, decoded and re-encoded at intake.
    pub images: Vec<ImagePart>,
    /// The one current code buffer. Extraction installs it; each applied
    /// correction replaces it whole.
    pub current_code: Option<String>,
    /// Diagnostic from the most recent validation. The empty string means
    /// the listing passed; `None` means validation has not run yet.
    pub validation_errors: Option<String>,
    /// Staged tape image, present while a packaged copy exists locally.
    pub tap_file_path: Option<PathBuf>,
    /// Retrieval URL, present once publication has been confirmed.
    pub tap_public_url: Option<String>,
    pub history: Vec<HistoryEntry>,
}

impl Session {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            started_at: Utc::now(),
            source_text: None,
            images: Vec::new(),
            current_code: None,
            validation_errors: None,
            tap_file_path: None,
            tap_public_url: None,
            history: Vec::new(),
        }
    }

    /// Drop all upload state ahead of a fresh intake so a run can never see
    /// a stale image from an earlier request.
    pub fn clear_uploads(&mut self) {
        self.images.clear();
    }

    pub fn push_event(&mut self, event: SessionEvent) {
        self.history.push(HistoryEntry {
            at: Utc::now(),
            event,
        });
    }

    /// Render the history as a chronological plain-text log for the summary
    /// prompt.
    pub fn history_log(&self) -> String {
        let mut out = String::new();
        for entry in &self.history {
            out.push_str(&format!(
                "{} {}\n",
                entry.at.format("%H:%M:%S"),
                entry.event.describe()
            ));
        }
        out
    }
}
