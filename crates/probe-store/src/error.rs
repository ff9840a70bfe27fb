//! Error types for probe-store.

use std::path::PathBuf;

/// Result type for probe-store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while writing or reading a sample log.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Failed to create the log directory.
    #[error("Failed to create log directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to create the log file and write its preamble.
    #[error("Failed to create log file {path}: {source}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to append a row.
    #[error("Failed to append to log file {path}: {source}")]
    Append {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to read the log back.
    #[error("Failed to read log file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A logged row could not be turned back into a reading.
    #[error("Invalid log row for packet {packet_index}: {reason}")]
    InvalidRow { packet_index: u16, reason: String },

    /// CSV encoding or decoding error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}
