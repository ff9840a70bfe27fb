//! Fixed-layout sensor packet codec.
//!
//! Every packet is exactly [`PACKET_LEN`] bytes:
//!
//! | Bytes | Field |
//! |-------|-------|
//! | 0-1 | Packet index (u16 BE) |
//! | 2 | Battery level |
//! | 3-8 | Four 12-bit samples, packed big-endian |
//!
//! The sample area packs two samples into every three bytes:
//! `s0 = b3 << 4 | b4 >> 4`, `s1 = (b4 & 0xF) << 8 | b5`, and the same for
//! `s2`/`s3` over bytes 6-8.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{ParseError, ParseResult};

/// Length of one sensor packet in bytes.
pub const PACKET_LEN: usize = 9;

/// Number of samples carried by one packet.
pub const SAMPLES_PER_PACKET: usize = 4;

/// Largest value a 12-bit sample can take.
pub const SAMPLE_MAX: u16 = 0x0FFF;

/// Raw bytes of one packet.
pub type RawPacket = [u8; PACKET_LEN];

/// The decoded fields of one sensor packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Packet {
    /// Sequence number used as the dedup and sort key.
    pub index: u16,
    /// Battery level as reported by the peripheral (nominally 0-100).
    pub battery: u8,
    /// Four raw 12-bit samples.
    pub samples: [u16; SAMPLES_PER_PACKET],
}

impl Packet {
    /// Decode a packet from a slice that must be exactly [`PACKET_LEN`] bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidLength`] for any other length.
    ///
    /// # Examples
    ///
    /// ```
    /// use probe_types::Packet;
    ///
    /// let packet = Packet::decode(&[0x00, 0x05, 0x64, 0xAB, 0xC1, 0x23, 0xDE, 0xF4, 0x56]).unwrap();
    /// assert_eq!(packet.index, 5);
    /// assert_eq!(packet.battery, 100);
    /// assert_eq!(packet.samples, [0xABC, 0x123, 0xDEF, 0x456]);
    /// ```
    #[must_use = "parsing returns a Result that should be handled"]
    pub fn decode(data: &[u8]) -> ParseResult<Self> {
        let raw: &RawPacket = data.try_into().map_err(|_| ParseError::InvalidLength {
            expected: PACKET_LEN,
            actual: data.len(),
        })?;
        Ok(Self::from_raw(raw))
    }

    /// Decode a packet from a fixed-size array. Cannot fail.
    pub fn from_raw(raw: &RawPacket) -> Self {
        use bytes::Buf;

        let mut buf = &raw[..];
        let index = buf.get_u16();
        let battery = buf.get_u8();
        let [s0, s1] = unpack_pair([buf.get_u8(), buf.get_u8(), buf.get_u8()]);
        let [s2, s3] = unpack_pair([buf.get_u8(), buf.get_u8(), buf.get_u8()]);

        Self {
            index,
            battery,
            samples: [s0, s1, s2, s3],
        }
    }

    /// Encode the packet back into its wire form.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::SampleOutOfRange`] if any sample exceeds [`SAMPLE_MAX`].
    pub fn encode(&self) -> ParseResult<RawPacket> {
        use bytes::BufMut;

        for (index, &value) in self.samples.iter().enumerate() {
            if value > SAMPLE_MAX {
                return Err(ParseError::SampleOutOfRange { index, value });
            }
        }

        let mut raw = [0u8; PACKET_LEN];
        let mut buf = &mut raw[..];
        buf.put_u16(self.index);
        buf.put_u8(self.battery);
        buf.put_slice(&pack_pair(self.samples[0], self.samples[1]));
        buf.put_slice(&pack_pair(self.samples[2], self.samples[3]));
        Ok(raw)
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} battery={}% samples=[{}, {}, {}, {}]",
            self.index,
            self.battery,
            self.samples[0],
            self.samples[1],
            self.samples[2],
            self.samples[3]
        )
    }
}

fn unpack_pair(b: [u8; 3]) -> [u16; 2] {
    let [b0, b1, b2] = b.map(u16::from);
    [
        ((b0 << 4) | (b1 >> 4)) & SAMPLE_MAX,
        (((b1 & 0x0F) << 8) | b2) & SAMPLE_MAX,
    ]
}

fn pack_pair(first: u16, second: u16) -> [u8; 3] {
    [
        (first >> 4) as u8,
        (((first & 0x0F) << 4) | ((second >> 8) & 0x0F)) as u8,
        (second & 0xFF) as u8,
    ]
}

/// Split a buffer of concatenated packets and decode each one.
///
/// A read may return several packets back to back. The buffer length must be a
/// non-zero multiple of [`PACKET_LEN`]; a trailing partial packet rejects the
/// whole buffer instead of being silently truncated.
///
/// Returns each decoded packet together with its raw bytes.
///
/// # Errors
///
/// - [`ParseError::InvalidLength`] for an empty buffer.
/// - [`ParseError::TrailingBytes`] if the length is not a multiple of [`PACKET_LEN`].
pub fn decode_many(data: &[u8]) -> ParseResult<Vec<(Packet, RawPacket)>> {
    if data.is_empty() {
        return Err(ParseError::InvalidLength {
            expected: PACKET_LEN,
            actual: 0,
        });
    }

    let chunks = data.chunks_exact(PACKET_LEN);
    let trailing = chunks.remainder().len();
    if trailing != 0 {
        return Err(ParseError::TrailingBytes {
            complete: data.len() / PACKET_LEN,
            trailing,
        });
    }

    chunks
        .map(|chunk| {
            let raw: RawPacket = chunk.try_into().map_err(|_| ParseError::InvalidLength {
                expected: PACKET_LEN,
                actual: chunk.len(),
            })?;
            Ok((Packet::from_raw(&raw), raw))
        })
        .collect()
}

/// Format raw packet bytes as lowercase hex.
pub fn to_hex(raw: &[u8]) -> String {
    use fmt::Write;

    raw.iter().fold(String::with_capacity(raw.len() * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}

/// Parse a hex string (no separators, either case) into bytes.
pub fn from_hex(text: &str) -> ParseResult<Vec<u8>> {
    let text = text.trim();
    if text.len() % 2 != 0 {
        return Err(ParseError::InvalidText {
            format: "hex",
            reason: format!("odd number of digits ({})", text.len()),
        });
    }
    (0..text.len())
        .step_by(2)
        .map(|i| {
            text.get(i..i + 2)
                .filter(|pair| pair.bytes().all(|b| b.is_ascii_hexdigit()))
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| ParseError::InvalidText {
                    format: "hex",
                    reason: format!("invalid digits at offset {i}"),
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_BYTES: RawPacket = [0x00, 0x05, 0x64, 0xAB, 0xC1, 0x23, 0xDE, 0xF4, 0x56];

    #[test]
    fn test_decode_reference_packet() {
        let packet = Packet::decode(&SAMPLE_BYTES).unwrap();
        assert_eq!(packet.index, 5);
        assert_eq!(packet.battery, 100);
        assert_eq!(packet.samples, [0xABC, 0x123, 0xDEF, 0x456]);
    }

    #[test]
    fn test_decode_index_is_big_endian() {
        let mut raw = SAMPLE_BYTES;
        raw[0] = 0x12;
        raw[1] = 0x34;
        assert_eq!(Packet::from_raw(&raw).index, 0x1234);
    }

    #[test]
    fn test_decode_rejects_short_and_long() {
        assert_eq!(
            Packet::decode(&SAMPLE_BYTES[..8]),
            Err(ParseError::InvalidLength {
                expected: 9,
                actual: 8
            })
        );

        let mut long = SAMPLE_BYTES.to_vec();
        long.push(0);
        assert!(matches!(
            Packet::decode(&long),
            Err(ParseError::InvalidLength { actual: 10, .. })
        ));
    }

    #[test]
    fn test_all_ones_masks_to_12_bits() {
        let packet = Packet::from_raw(&[0xFF; PACKET_LEN]);
        assert_eq!(packet.samples, [SAMPLE_MAX; 4]);
        assert_eq!(packet.index, u16::MAX);
    }

    #[test]
    fn test_encode_reference_packet() {
        let packet = Packet {
            index: 5,
            battery: 100,
            samples: [0xABC, 0x123, 0xDEF, 0x456],
        };
        assert_eq!(packet.encode().unwrap(), SAMPLE_BYTES);
    }

    #[test]
    fn test_encode_rejects_wide_sample() {
        let packet = Packet {
            index: 1,
            battery: 50,
            samples: [0, 0, 0x1000, 0],
        };
        assert_eq!(
            packet.encode(),
            Err(ParseError::SampleOutOfRange {
                index: 2,
                value: 0x1000
            })
        );
    }

    #[test]
    fn test_decode_many_splits_packets() {
        let mut second = SAMPLE_BYTES;
        second[1] = 0x06;
        let data = [SAMPLE_BYTES, second].concat();

        let packets = decode_many(&data).unwrap();
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].0.index, 5);
        assert_eq!(packets[1].0.index, 6);
        assert_eq!(packets[1].1, second);
    }

    #[test]
    fn test_decode_many_rejects_trailing_partial() {
        let mut data = SAMPLE_BYTES.to_vec();
        data.extend_from_slice(&[1, 2, 3]);
        assert_eq!(
            decode_many(&data),
            Err(ParseError::TrailingBytes {
                complete: 1,
                trailing: 3
            })
        );
    }

    #[test]
    fn test_decode_many_rejects_empty() {
        assert!(matches!(
            decode_many(&[]),
            Err(ParseError::InvalidLength { actual: 0, .. })
        ));
    }

    #[test]
    fn test_hex_helpers() {
        assert_eq!(to_hex(&SAMPLE_BYTES), "000564abc123def456");
        assert_eq!(from_hex("000564ABC123DEF456").unwrap(), SAMPLE_BYTES.to_vec());
        assert!(from_hex("abc").is_err());
        assert!(from_hex("zz").is_err());
        assert!(from_hex("+a+b").is_err());
        assert!(from_hex("-1").is_err());
    }
}
