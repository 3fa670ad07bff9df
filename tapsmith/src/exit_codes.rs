//! Stable exit codes for tapsmith CLI commands.

/// Command succeeded; for `run`, the tape image was packaged and published.
pub const OK: i32 = 0;
/// Command failed: missing tool, bad config, I/O error, or other errors.
pub const FAILED: i32 = 1;
/// `tapsmith check` found assembler diagnostics in the listing.
pub const INVALID_LISTING: i32 = 2;
/// `tapsmith run` spent the refinement budget without a clean validation.
pub const BUDGET_EXHAUSTED: i32 = 3;
