//! Series command implementation.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use probe_core::{SeriesStore, TimeWindow};
use probe_store::parse_log;

use crate::config::Config;
use crate::format::{as_json, format_series_text};
use crate::util::write_output;

/// Print the windowed series of a log file.
pub fn cmd_series(
    log: Option<&Path>,
    hours: u32,
    json: bool,
    config: &Config,
    output: Option<&PathBuf>,
) -> Result<()> {
    let Some(window) = TimeWindow::from_hours(hours) else {
        bail!("--hours must be 0, 1, 6 or 24 (got {hours})");
    };
    let path = log.map(Path::to_path_buf).unwrap_or_else(|| config.log_path());
    let coefficients = config.require_coefficients()?;

    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read log {}", path.display()))?;
    let contents = parse_log(&text);
    if contents.skipped > 0 {
        tracing::warn!("Skipped {} unreadable rows", contents.skipped);
    }

    let mut store = SeriesStore::new();
    let loaded = store.load_from_log(&contents.rows, &coefficients);
    tracing::info!("Loaded {} readings from {} ({})", loaded, path.display(), window);

    let points = store.windowed(window);
    let content = if json {
        as_json(&points)?
    } else {
        format_series_text(&points)?
    };
    write_output(output, &content)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOG: &str = "AA:BB,ffe0,Probe\n\
        packetIndex,batteryLevel,reading1,reading2,reading3,reading4,avgReading,time,date,data\n\
        6,90,1,1,1,1,4.0,10:00:01,2025-03-01,00065a001001001001\n\
        5,100,2748,291,3567,1110,12.5,09:05:07,2025-03-01,000564abc123def456\n\
        6,90,1,1,1,1,8.0,10:00:02,2025-03-01,00065a001001001001\n";

    fn config() -> Config {
        Config::parse("[coefficients]\nc3 = 1.0\nc2 = 1.0\nc1 = 1.0\nc0 = 1.0\n").unwrap()
    }

    #[test]
    fn test_series_is_sorted_and_deduplicated() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("log.csv");
        let out = dir.path().join("out.txt");
        std::fs::write(&log, LOG).unwrap();

        cmd_series(Some(&log), 0, false, &config(), Some(&out)).unwrap();

        let text = std::fs::read_to_string(&out).unwrap();
        assert_eq!(
            text,
            "2025-03-01T09:05:07Z  12.500\n2025-03-01T10:00:02Z  8.000\n"
        );
    }

    #[test]
    fn test_series_rejects_unknown_window() {
        let result = cmd_series(Some(Path::new("/nonexistent")), 3, false, &config(), None);
        assert!(result.unwrap_err().to_string().contains("--hours"));
    }

    #[test]
    fn test_series_missing_log() {
        let result = cmd_series(Some(Path::new("/nonexistent/log.csv")), 0, true, &config(), None);
        assert!(result.is_err());
    }
}
