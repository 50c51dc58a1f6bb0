//! I/O error types.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for I/O operations.
pub type Result<T> = std::result::Result<T, Error>;

/// I/O error types.
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Memory mapping error.
    #[error("memory mapping error: {0}")]
    MmapError(String),

    /// Malformed record in an event file.
    #[error("invalid event record at line {line}: {message}")]
    InvalidFormat {
        /// 1-based line number.
        line: usize,
        /// Parser message.
        message: String,
    },

    /// Output file extension not recognised.
    #[error("unsupported output format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Core library error.
    #[error("core error: {0}")]
    CoreError(#[from] cbcstub_core::Error),
}
