//! Host-side utilities for ddev.

/// Archive extraction.
pub mod archive;
/// Import path validation.
pub mod asset;
/// Environment variable utilities.
pub mod env;
/// Filesystem utilities.
pub mod fs;
/// Advisory file locks.
pub mod lock;
/// Interactive prompts.
pub mod prompt;
