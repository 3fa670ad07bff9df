//! LLM-assisted conversion of ZX Spectrum BASIC listings into tape images.
//!
//! This crate turns a BASIC listing (typed text, scanned magazine pages, or
//! both) into a published `.tap` tape image. An external `bas2tap`-compatible
//! assembler is the ground truth for whether a listing is acceptable; an LLM
//! collaborator transcribes and repairs it. The architecture enforces a strict
//! separation:
//!
//! - **[`core`]**: Pure, deterministic logic (verdicts, listing hygiene,
//!   session state). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (process execution, image intake,
//!   config, persistence). External tools sit behind traits to enable
//!   scripted doubles in tests.
//!
//! Stage modules ([`extract`], [`validate`], [`correct`], [`refine`],
//! [`package`], [`summary`]) coordinate core logic with I/O; [`pipeline`]
//! sequences them into the full run.

pub mod core;
pub mod correct;
pub mod exit_codes;
pub mod extract;
pub mod io;
pub mod logging;
pub mod package;
pub mod pipeline;
pub mod refine;
pub mod summary;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod validate;
