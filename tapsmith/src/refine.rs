//! Bounded validate/correct refinement loop over the session listing.

use anyhow::{Result, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::core::listing::line_count;
use crate::core::session::{Session, SessionEvent};
use crate::core::types::Verdict;
use crate::correct::run_correction;
use crate::io::assembler::TapAssembler;
use crate::io::transform::TextTransform;
use crate::validate::run_validation;

/// Reason why `run_refinement` stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefineStop {
    /// The assembler accepted the listing.
    Clean,
    /// `max_iterations` cycles elapsed with the listing still rejected. The
    /// last candidate and its diagnostic stay in the session; this is a soft
    /// outcome, not an error.
    BudgetExhausted { last_diagnostic: String },
}

/// Summary of a refinement invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefineOutcome {
    pub validations: u32,
    pub corrections: u32,
    pub stop: RefineStop,
}

/// Per-iteration progress record passed to the loop callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefineStep {
    /// Iteration number (1-indexed).
    pub iter: u32,
    pub verdict: Verdict,
}

/// Alternate validation and correction until the listing passes or the
/// iteration budget runs out.
///
/// Within an iteration, validation always runs first and correction runs
/// only on a rejection; correction never runs twice without a validation in
/// between, and the final correction of an exhausted run is left unvalidated
/// by design. Termination is structural: the loop body runs at most
/// `max_iterations` times. Infrastructure failures (missing assembler,
/// collaborator errors) stop the loop immediately and are never folded into
/// a verdict.
#[instrument(skip_all, fields(max_iterations))]
pub fn run_refinement<A, T, F>(
    assembler: &A,
    corrector: &T,
    session: &mut Session,
    max_iterations: u32,
    mut on_iteration: F,
) -> Result<RefineOutcome>
where
    A: TapAssembler,
    T: TextTransform,
    F: FnMut(&RefineStep),
{
    if max_iterations == 0 {
        return Err(anyhow!("max_iterations must be > 0"));
    }

    let mut validations = 0u32;
    let mut corrections = 0u32;

    for iter in 1..=max_iterations {
        let listing = session
            .current_code
            .clone()
            .ok_or_else(|| anyhow!("no current listing to refine (extraction has not run)"))?;

        let verdict = run_validation(assembler, &listing)?;
        validations += 1;
        on_iteration(&RefineStep {
            iter,
            verdict: verdict.clone(),
        });

        match verdict {
            Verdict::Valid => {
                session.validation_errors = Some(String::new());
                session.push_event(SessionEvent::ValidationPassed { iteration: iter });
                info!(iter, validations, corrections, "listing accepted");
                return Ok(RefineOutcome {
                    validations,
                    corrections,
                    stop: RefineStop::Clean,
                });
            }
            Verdict::Invalid { message } => {
                debug!(iter, "listing rejected, requesting correction");
                session.validation_errors = Some(message.clone());
                session.push_event(SessionEvent::ValidationFailed {
                    iteration: iter,
                    message: message.clone(),
                });

                let revised = run_correction(corrector, &listing, &message)?;
                let lines = line_count(&revised);
                session.current_code = Some(revised);
                corrections += 1;
                session.push_event(SessionEvent::CorrectionApplied {
                    iteration: iter,
                    lines,
                });
            }
        }
    }

    let last_diagnostic = session.validation_errors.clone().unwrap_or_default();
    session.push_event(SessionEvent::BudgetExhausted {
        iterations: max_iterations,
    });
    warn!(max_iterations, "refinement budget exhausted");
    Ok(RefineOutcome {
        validations,
        corrections,
        stop: RefineStop::BudgetExhausted { last_diagnostic },
    })
}
