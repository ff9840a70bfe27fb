//! Output formatting for packets, readings and series.

use std::fmt::Write;

use anyhow::Result;
use time::format_description::well_known::Rfc3339;

use probe_core::{RunStats, SeriesPoint};
use probe_types::{Packet, Reading};

pub fn format_packet_text(packet: &Packet) -> String {
    format!(
        "#{:<5} battery {:>3}%  samples {:?}\n",
        packet.index, packet.battery, packet.samples
    )
}

pub fn format_reading_text(reading: &Reading) -> String {
    let calibrated: Vec<String> = reading
        .calibrated
        .iter()
        .map(|v| format!("{v:.3}"))
        .collect();
    format!(
        "#{:<5} battery {:>3}%  samples {:?}  calibrated [{}]  avg {:.3}\n",
        reading.packet_index,
        reading.battery_level,
        reading.samples,
        calibrated.join(", "),
        reading.average
    )
}

pub fn format_series_text(points: &[SeriesPoint]) -> Result<String> {
    let mut out = String::new();
    for point in points {
        writeln!(out, "{}  {:.3}", point.timestamp.format(&Rfc3339)?, point.value)?;
    }
    Ok(out)
}

pub fn format_stats_text(stats: &RunStats) -> String {
    format!(
        "bursts {}  reads {} ({} failed)  readings {}  malformed {}  rows {} ({} failed)\n",
        stats.bursts,
        stats.reads,
        stats.read_failures,
        stats.readings,
        stats.malformed,
        stats.rows_written,
        stats.persistence_failures
    )
}

pub fn as_json<T: serde::Serialize>(value: &T) -> Result<String> {
    let mut json = serde_json::to_string_pretty(value)?;
    json.push('\n');
    Ok(json)
}
