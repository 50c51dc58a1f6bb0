//! Error types for cbcstub-core.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for cbcstub operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for cbcstub operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Channel mask file could not be opened or read.
    #[error("channel mask file {path} unavailable: {source}")]
    ConfigUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Event source missing or malformed.
    #[error("event source unavailable: {0}")]
    SourceUnavailable(String),

    /// A histogram was filled before it was booked.
    #[error("histogram <{0}> not found")]
    MissingNamedMetric(String),

    /// Raw channel outside the readout range of a layer.
    #[error("invalid channel: {0} (valid range 0..=2031)")]
    InvalidChannel(u16),

    /// Invalid analysis configuration.
    #[error("configuration error: {0}")]
    InvalidConfig(String),
}
