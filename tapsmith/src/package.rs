//! Packaging stage: assembles a validated listing into a persistent tape
//! image.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};

use crate::io::assembler::{AssembleRequest, TapAssembler};
use crate::validate::write_source_tempfile;

/// Assemble `listing` into a tape image at `dest`.
///
/// The listing is expected to have just passed validation, so a rejection
/// here is an error, not a verdict. The scratch source file is scoped and
/// always removed; any partial destination file is removed when the
/// assembler rejects the listing or fails to run, so `dest` exists exactly
/// when packaging succeeded.
#[instrument(skip_all, fields(dest = %dest.display()))]
pub fn run_packaging<A: TapAssembler>(assembler: &A, listing: &str, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create tape output dir {}", parent.display()))?;
    }

    let source = write_source_tempfile(listing)?;
    let outcome = assembler.assemble(&AssembleRequest {
        source: source.path().to_path_buf(),
        dest: dest.to_path_buf(),
    });

    match outcome {
        Ok(run) if run.success() => {
            if !dest.exists() {
                return Err(anyhow!(
                    "assembler reported success but wrote no tape image at {}",
                    dest.display()
                ));
            }
            debug!("tape image written");
            Ok(())
        }
        Ok(run) => {
            remove_partial(dest);
            Err(anyhow!(
                "assembler rejected a listing that had passed validation (status {:?}): {}",
                run.exit_code,
                run.stderr.trim()
            ))
        }
        Err(err) => {
            remove_partial(dest);
            Err(err)
        }
    }
}

fn remove_partial(dest: &Path) {
    if dest.exists()
        && let Err(err) = fs::remove_file(dest)
    {
        warn!(dest = %dest.display(), err = %err, "failed to remove partial tape image");
    }
}
