//! Shared plumbing for the utility scheduler workspace
//!
//! Provides the pieces every crate and service reaches for:
//! - logging initialisation (bracketed-level console format, optional JSON)
//! - SQLite pool construction tuned for a small edge database

pub mod error;
pub mod logging;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use error::{Error, Result};
pub use logging::LogConfig;

// Re-export common dependencies
pub use anyhow;
