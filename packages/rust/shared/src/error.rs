//! Error types for OutlineLens.
//!
//! Library crates use [`OutlineError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all OutlineLens operations.
#[derive(Debug, thiserror::Error)]
pub enum OutlineError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// HTML or CSS selector parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Article scoring or heading traversal failed.
    #[error("extraction error: {0}")]
    Extraction(String),

    /// A cross-boundary publish was rejected or timed out (transient).
    #[error("delivery error: {0}")]
    Delivery(String),

    /// The hosting extension context is gone; no retry is possible.
    #[error("extension context invalidated")]
    ContextInvalidated,

    /// A request referenced a heading that is no longer on the page.
    #[error("heading not found: {id}")]
    MissingTarget { id: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad viewport, malformed domain, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, OutlineError>;

impl OutlineError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether a failed delivery may be retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Delivery(_))
    }
}
