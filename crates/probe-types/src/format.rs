//! Text display formats for characteristic values.
//!
//! These are presentation conversions for raw reads, writes and
//! notifications, not numeric decoding of sensor packets.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{ParseError, ParseResult};

/// How characteristic bytes are shown to and entered by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum DisplayFormat {
    /// Bytes interpreted as UTF-8 text.
    Utf8,
    /// Comma-separated decimal byte values.
    Decimal,
    /// Lowercase hex digits.
    #[default]
    Hex,
}

impl DisplayFormat {
    /// Render bytes as text in this format.
    ///
    /// ```
    /// use probe_types::DisplayFormat;
    ///
    /// assert_eq!(DisplayFormat::Hex.render(&[0xAB, 0x01]), "ab01");
    /// assert_eq!(DisplayFormat::Decimal.render(&[171, 1]), "171,1");
    /// assert_eq!(DisplayFormat::Utf8.render(b"hi"), "hi");
    /// ```
    #[must_use]
    pub fn render(&self, bytes: &[u8]) -> String {
        match self {
            DisplayFormat::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            DisplayFormat::Decimal => bytes
                .iter()
                .map(u8::to_string)
                .collect::<Vec<_>>()
                .join(","),
            DisplayFormat::Hex => crate::packet::to_hex(bytes),
        }
    }

    /// Parse user-entered text into bytes to write.
    ///
    /// Decimal and hex input are split into two-character groups, each group
    /// becoming one byte.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidText`] if the text contains characters that
    /// do not belong to the format.
    pub fn parse(&self, text: &str) -> ParseResult<Vec<u8>> {
        match self {
            DisplayFormat::Utf8 => Ok(text.as_bytes().to_vec()),
            DisplayFormat::Decimal => parse_groups(text, 10, "decimal"),
            DisplayFormat::Hex => parse_groups(&text.to_lowercase(), 16, "hex"),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            DisplayFormat::Utf8 => "UTF-8",
            DisplayFormat::Decimal => "Dec",
            DisplayFormat::Hex => "Hex",
        }
    }
}

fn parse_groups(text: &str, radix: u32, format: &'static str) -> ParseResult<Vec<u8>> {
    if text.is_empty() {
        return Err(ParseError::InvalidText {
            format,
            reason: "empty input".to_string(),
        });
    }
    if let Some(bad) = text.chars().find(|c| !c.is_digit(radix)) {
        return Err(ParseError::InvalidText {
            format,
            reason: format!("unexpected character {bad:?}"),
        });
    }

    // All characters are ASCII digits at this point.
    text.as_bytes()
        .chunks(2)
        .map(|group| {
            let group = core::str::from_utf8(group).unwrap_or_default();
            u8::from_str_radix(group, radix).map_err(|e| ParseError::InvalidText {
                format,
                reason: e.to_string(),
            })
        })
        .collect()
}

impl fmt::Display for DisplayFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DisplayFormat {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "utf8" | "utf-8" | "text" => Ok(DisplayFormat::Utf8),
            "dec" | "decimal" => Ok(DisplayFormat::Decimal),
            "hex" => Ok(DisplayFormat::Hex),
            other => Err(ParseError::InvalidText {
                format: "display format",
                reason: format!("unknown format {other:?}"),
            }),
        }
    }
}
