//! Processed reading types.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::ParseResult;
use crate::packet::{Packet, PACKET_LEN, RawPacket, SAMPLES_PER_PACKET};
use crate::transform::{mean, Coefficients};

/// One fully processed sensor reading.
///
/// Built from a decoded [`Packet`] and a set of [`Coefficients`] at decode time
/// and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Reading {
    /// Sequence number embedded in the packet.
    pub packet_index: u16,
    /// Battery level (nominally 0-100).
    pub battery_level: u8,
    /// Raw 12-bit samples.
    pub samples: [u16; SAMPLES_PER_PACKET],
    /// Calibrated value of each sample.
    pub calibrated: [f64; SAMPLES_PER_PACKET],
    /// Mean of the calibrated values.
    pub average: f64,
    /// When the reading was taken.
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub captured_at: OffsetDateTime,
    /// The packet bytes exactly as received.
    pub raw: RawPacket,
}

impl Reading {
    /// Calibrate a decoded packet.
    pub fn from_packet(
        packet: &Packet,
        raw: RawPacket,
        coefficients: &Coefficients,
        captured_at: OffsetDateTime,
    ) -> Self {
        let calibrated = coefficients.apply_all(&packet.samples);
        Self {
            packet_index: packet.index,
            battery_level: packet.battery,
            samples: packet.samples,
            calibrated,
            average: mean(&calibrated),
            captured_at,
            raw,
        }
    }

    /// Decode and calibrate a single 9-byte packet.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`](crate::ParseError) if `data` is not exactly
    /// [`PACKET_LEN`] bytes.
    pub fn decode(
        data: &[u8],
        coefficients: &Coefficients,
        captured_at: OffsetDateTime,
    ) -> ParseResult<Self> {
        let packet = Packet::decode(data)?;
        let mut raw = [0u8; PACKET_LEN];
        raw.copy_from_slice(data);
        Ok(Self::from_packet(&packet, raw, coefficients, captured_at))
    }

    /// The chart point derived from this reading.
    #[must_use]
    pub fn point(&self) -> SeriesPoint {
        SeriesPoint {
            timestamp: self.captured_at,
            value: self.average,
        }
    }

    /// Raw packet bytes as lowercase hex.
    #[must_use]
    pub fn raw_hex(&self) -> String {
        crate::packet::to_hex(&self.raw)
    }
}

/// One point of the aggregated time series.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SeriesPoint {
    /// Capture time of the reading behind this point.
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub timestamp: OffsetDateTime,
    /// Calibrated average of the reading.
    pub value: f64,
}
