//! parley-utils: Common utilities shared across parley crates
//!
//! This crate provides:
//! - Unified error types ([`ParleyError`], [`Result`])
//! - Logging to a file, optionally mirrored to stderr ([`init_logging`], [`LogConfig`])
//! - XDG-compliant path utilities ([`paths`] module)

pub mod error;
pub mod logging;
pub mod paths;

// Re-export main types at crate root for convenience
pub use error::{ParleyError, Result};
pub use logging::{init_logging, LogConfig, LogOutput, LOG_ENV, LOG_FILE};

// Re-export commonly used path functions
pub use paths::{config_dir, config_file, data_dir, download_dir, ensure_dir, log_dir, state_dir};
