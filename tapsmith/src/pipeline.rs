//! Pipeline controller: sequences intake, extraction, refinement, packaging,
//! publication, and summary over one session.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::core::session::{Session, SessionEvent};
use crate::extract::run_extraction;
use crate::io::artifact::ArtifactStore;
use crate::io::assembler::TapAssembler;
use crate::io::config::PipelineConfig;
use crate::io::image::{UploadPart, intake_uploads};
use crate::io::session_store::{RunPaths, save_session};
use crate::io::transform::TextTransform;
use crate::package::run_packaging;
use crate::refine::{RefineStep, RefineStop, run_refinement};
use crate::summary::run_summary;

/// Inputs for one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineInput {
    /// Listing text supplied directly, surrounding prose and all.
    pub source_text: Option<String>,
    /// Scanned listing pages.
    pub uploads: Vec<UploadPart>,
}

/// Terminal state of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineStop {
    /// The tape image was packaged, published, and reported on.
    Packaged { tap_public_url: String, report: String },
    /// The refinement budget ran out; packaging never happened. The last
    /// candidate is kept on disk for inspection.
    BudgetExhausted {
        last_diagnostic: String,
        listing_path: PathBuf,
    },
}

/// Summary of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutcome {
    pub run_id: String,
    pub validations: u32,
    pub corrections: u32,
    pub stop: PipelineStop,
}

/// Run the full pipeline in `root`.
///
/// Stages execute in a fixed order over one session: intake, extraction,
/// refinement, then either packaging + publication + summary (clean exit) or
/// a budget exit that skips all three. The staged tape image is deleted only
/// after the store confirms publication; if publication fails, the staged
/// copy stays put and the error says where it is. The session record lands
/// in `.tapsmith/runs/<run-id>/session.json` in both terminal states.
#[instrument(skip_all, fields(root = %root.display()))]
pub fn run_pipeline<A, T, S, F>(
    root: &Path,
    input: PipelineInput,
    assembler: &A,
    transform: &T,
    store: &S,
    config: &PipelineConfig,
    mut on_iteration: F,
) -> Result<PipelineOutcome>
where
    A: TapAssembler,
    T: TextTransform,
    S: ArtifactStore,
    F: FnMut(&RefineStep),
{
    config.validate()?;

    let run_id = new_run_id();
    let paths = RunPaths::new(root, &run_id);
    fs::create_dir_all(&paths.run_dir)
        .with_context(|| format!("create run dir {}", paths.run_dir.display()))?;
    info!(run_id = %run_id, "pipeline started");

    let mut session = Session::new(run_id.clone());
    session.source_text = input.source_text;
    intake_uploads(&mut session, &input.uploads);

    run_extraction(transform, &mut session)?;

    let refined = run_refinement(
        assembler,
        transform,
        &mut session,
        config.max_iterations,
        &mut on_iteration,
    )?;

    let stop = match refined.stop {
        RefineStop::Clean => {
            let listing = session
                .current_code
                .clone()
                .ok_or_else(|| anyhow!("validated listing missing from session"))?;
            run_packaging(assembler, &listing, &paths.tap_stage_path)?;
            session.tap_file_path = Some(paths.tap_stage_path.clone());
            session.push_event(SessionEvent::TapCreated {
                path: paths.tap_stage_path.clone(),
            });

            let url = store.publish(&paths.tap_stage_path).with_context(|| {
                format!(
                    "publish tape image (staged copy kept at {})",
                    paths.tap_stage_path.display()
                )
            })?;
            info!(url = %url, "tape image published");
            // The staged copy goes away only once the store has confirmed
            // the transfer.
            fs::remove_file(&paths.tap_stage_path).with_context(|| {
                format!("remove staged tape image {}", paths.tap_stage_path.display())
            })?;
            session.tap_file_path = None;
            session.tap_public_url = Some(url.clone());
            session.push_event(SessionEvent::TapPublished { url: url.clone() });
            // Publication already happened; persist it before the summary so
            // a failed report cannot lose the URL.
            save_session(&paths.session_path, &session)?;

            let report = run_summary(transform, &session)?;
            PipelineStop::Packaged {
                tap_public_url: url,
                report,
            }
        }
        RefineStop::BudgetExhausted { last_diagnostic } => {
            if let Some(listing) = session.current_code.as_deref() {
                fs::write(&paths.listing_path, listing).with_context(|| {
                    format!("write last candidate {}", paths.listing_path.display())
                })?;
            }
            warn!(run_id = %run_id, "refinement budget exhausted, packaging skipped");
            PipelineStop::BudgetExhausted {
                last_diagnostic,
                listing_path: paths.listing_path.clone(),
            }
        }
    };

    save_session(&paths.session_path, &session)?;
    info!(run_id = %run_id, validations = refined.validations, corrections = refined.corrections, "pipeline finished");

    Ok(PipelineOutcome {
        run_id,
        validations: refined.validations,
        corrections: refined.corrections,
        stop,
    })
}

fn new_run_id() -> String {
    format!("run-{}", Uuid::new_v4())
}
