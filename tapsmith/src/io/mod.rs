//! I/O helpers for pipeline stages.

pub mod artifact;
pub mod assembler;
pub mod config;
pub mod image;
pub mod process;
pub mod prompt;
pub mod session_store;
pub mod transform;
