//! Error types for probe-types.

use thiserror::Error;

/// Errors that can occur when decoding or encoding sensor packets.
///
/// Every variant corresponds to a malformed packet from the caller's point of
/// view: the reading is dropped, never stored and never persisted.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// A single packet did not have exactly [`PACKET_LEN`](crate::packet::PACKET_LEN) bytes.
    #[error("Malformed packet: requires {expected} bytes, got {actual}")]
    InvalidLength {
        /// Required length.
        expected: usize,
        /// Length actually received.
        actual: usize,
    },

    /// A multi-packet buffer ended with a partial packet.
    #[error("Malformed packet: {trailing} trailing bytes after {complete} complete 9-byte packets")]
    TrailingBytes {
        /// Number of complete packets in the buffer.
        complete: usize,
        /// Number of leftover bytes.
        trailing: usize,
    },

    /// A sample does not fit in 12 bits.
    #[error("Sample {index} out of range: {value:#x} exceeds 0xfff")]
    SampleOutOfRange {
        /// Position of the sample within the packet (0-3).
        index: usize,
        /// The offending value.
        value: u16,
    },

    /// User text could not be converted to bytes in the selected display format.
    #[error("Value is not valid {format}: {reason}")]
    InvalidText {
        /// Display format name.
        format: &'static str,
        /// What was wrong with the input.
        reason: String,
    },
}

/// Errors raised before a sampling run starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// A polynomial coefficient was exactly zero, which means "not configured".
    #[error("Coefficient {name} is not configured (zero)")]
    ZeroCoefficient {
        /// Coefficient name (`c3`, `c2`, `c1` or `c0`).
        name: &'static str,
    },

    /// The acquisition schedule is inconsistent.
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),
}

/// Result type alias using probe-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
