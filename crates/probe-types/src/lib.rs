//! Platform-agnostic types for the sensor probe.
//!
//! This crate provides the pieces of the sampling pipeline that have no I/O:
//!
//! - The fixed 9-byte packet codec ([`Packet`], [`decode_many`])
//! - Cubic calibration of raw samples ([`Coefficients`])
//! - Processed reading and chart point types ([`Reading`], [`SeriesPoint`])
//! - Text display formats for reads, writes and notifications ([`DisplayFormat`])
//! - Error types for parsing and configuration
//!
//! # Example
//!
//! ```
//! use probe_types::{Coefficients, Reading};
//! use time::OffsetDateTime;
//!
//! let coeffs = Coefficients::new(1e-9, 1e-6, 0.01, 0.5)?;
//! let bytes = [0x00, 0x05, 0x64, 0xAB, 0xC1, 0x23, 0xDE, 0xF4, 0x56];
//! let reading = Reading::decode(&bytes, &coeffs, OffsetDateTime::now_utc())?;
//! assert_eq!(reading.packet_index, 5);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod error;
pub mod format;
pub mod packet;
pub mod transform;
pub mod types;

pub use error::{ConfigError, ParseError, ParseResult};
pub use format::DisplayFormat;
pub use packet::{
    decode_many, Packet, RawPacket, PACKET_LEN, SAMPLES_PER_PACKET, SAMPLE_MAX,
};
pub use transform::Coefficients;
pub use types::{Reading, SeriesPoint};
