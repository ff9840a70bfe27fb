//! Error types for probe-core.
//!
//! # Propagation
//!
//! | Error | Raised by | Effect on a run |
//! |-------|-----------|-----------------|
//! | [`Error::Configuration`] | `start()` pre-flight | Run refused |
//! | [`Error::AlreadyRunning`] | second `start()` | Existing run untouched |
//! | [`Error::MalformedPacket`] | decode of one read | Reading dropped, run continues |
//! | [`Error::InvalidInput`] | `write_text()` | Nothing sent |
//! | [`Error::Transport`] | one read or write | Reported, next scheduled read proceeds |
//! | [`Error::Persistence`] | log create/append | Reported, row lost, run continues |
//!
//! Only the first two are ever returned from the scheduler's API; the others
//! are reported through [`SamplingEvent`](crate::events::SamplingEvent)s and
//! `tracing` while sampling is underway.

use std::time::Duration;

use thiserror::Error;

use probe_types::{ConfigError, ParseError};

/// Errors that can occur in the sampling pipeline.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A read returned bytes that are not a valid packet.
    #[error(transparent)]
    MalformedPacket(#[from] ParseError),

    /// Text entered for a write does not match its display format.
    #[error("Invalid input: {0}")]
    InvalidInput(ParseError),

    /// The transport failed to read or write.
    #[error("Transport error during {operation}: {message}")]
    Transport {
        /// The operation that failed (`read`, `write`, ...).
        operation: String,
        /// Transport-provided description.
        message: String,
    },

    /// Coefficients or schedule are invalid.
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// The sample log could not be created or appended to.
    #[error("Persistence error: {0}")]
    Persistence(#[from] probe_store::Error),

    /// `start()` was called while a run is active.
    #[error("Sampling is already running")]
    AlreadyRunning,

    /// An operation needs an active run.
    #[error("Sampling is not running")]
    NotRunning,

    /// Operation timed out.
    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The timeout duration.
        duration: Duration,
    },
}

impl Error {
    /// Create a transport error with operation context.
    pub fn transport(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a timeout error with operation context.
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a schedule configuration error.
    pub fn invalid_schedule(message: impl Into<String>) -> Self {
        Self::Configuration(ConfigError::InvalidSchedule(message.into()))
    }

    /// Whether the error is local to one tick and sampling should go on.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::MalformedPacket(_)
                | Error::Transport { .. }
                | Error::Persistence(_)
                | Error::Timeout { .. }
        )
    }
}

/// Result type alias using probe-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;
