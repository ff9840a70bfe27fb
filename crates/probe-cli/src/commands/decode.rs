//! Decode command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use time::OffsetDateTime;

use probe_types::{DisplayFormat, Reading, decode_many};

use crate::config::Config;
use crate::format::{as_json, format_packet_text, format_reading_text};
use crate::util::write_output;

/// Decode one or more concatenated packets given as hex.
///
/// Calibrated values are shown when coefficients are configured.
pub fn cmd_decode(hex: &str, json: bool, config: &Config, output: Option<&PathBuf>) -> Result<()> {
    let bytes = DisplayFormat::Hex
        .parse(hex)
        .context("Packet must be given as hex")?;
    let packets = decode_many(&bytes).context("Failed to decode packet")?;
    let coefficients = config.coefficients()?;

    let content = match coefficients {
        Some(coefficients) => {
            let now = OffsetDateTime::now_utc();
            let readings: Vec<Reading> = packets
                .iter()
                .map(|(packet, raw)| Reading::from_packet(packet, *raw, &coefficients, now))
                .collect();
            if json {
                as_json(&readings)?
            } else {
                readings.iter().map(format_reading_text).collect()
            }
        }
        None => {
            let packets: Vec<_> = packets.into_iter().map(|(packet, _)| packet).collect();
            if json {
                as_json(&packets)?
            } else {
                packets.iter().map(format_packet_text).collect()
            }
        }
    };

    write_output(output, &content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.json");

        cmd_decode("000564ABC123DEF456", true, &Config::default(), Some(&out)).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(json[0]["index"], 5);
        assert_eq!(json[0]["battery"], 100);
    }

    #[test]
    fn test_decode_rejects_trailing_bytes() {
        let result = cmd_decode("000564ABC123DEF456AA", false, &Config::default(), None);
        assert!(result.is_err());
    }
}
