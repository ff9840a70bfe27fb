//! Simulate command implementation.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use probe_core::{MockTransport, SamplingEvent, SamplingScheduler, TimeWindow};

use crate::config::Config;
use crate::format::{format_reading_text, format_stats_text};
use crate::util::write_output;

/// Run the scheduler against synthetic packets for `duration`, or until Ctrl-C.
pub async fn cmd_simulate(
    duration: Duration,
    config: &Config,
    output: Option<&PathBuf>,
    quiet: bool,
) -> Result<()> {
    let options = config.sampling_options()?;
    let mut scheduler = SamplingScheduler::new(Arc::new(MockTransport::new()));
    let mut events = scheduler.subscribe();

    scheduler
        .start(options)
        .context("Failed to start sampling")?;
    if let Some(path) = scheduler.log_path() {
        info!("Logging to {}", path.display());
    }

    let deadline = tokio::time::sleep(duration);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            event = events.recv() => match event {
                Ok(SamplingEvent::Reading { reading }) => {
                    if !quiet {
                        print!("{}", format_reading_text(&reading));
                    }
                }
                Ok(SamplingEvent::RunStarted { restored }) if restored > 0 => {
                    info!("Continuing from {} logged readings", restored);
                }
                Ok(_) => {}
                Err(RecvError::Lagged(n)) => warn!("Missed {} events", n),
                Err(RecvError::Closed) => break,
            },
        }
    }

    let stats = scheduler.stats();
    let points = scheduler.windowed(TimeWindow::All).len();
    let log_path = scheduler.log_path();
    scheduler.shutdown().await?;

    let mut summary = format_stats_text(&stats);
    summary.push_str(&format!("{points} points in series\n"));
    if let Some(path) = log_path {
        summary.push_str(&format!("log: {}\n", path.display()));
    }
    write_output(output, &summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_simulate_writes_log() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::parse(&format!(
            r#"
            [device]
            peripheral_id = "AA:BB"

            [schedule]
            burst_interval_ms = 1000
            listen_duration_ms = 50
            read_period_ms = 10

            [coefficients]
            c3 = 1e-9
            c2 = 1e-6
            c1 = 0.5
            c0 = 2.0

            [log]
            directory = {:?}
            "#,
            dir.path().display().to_string()
        ))
        .unwrap();
        let summary = dir.path().join("summary.txt");

        cmd_simulate(Duration::from_millis(200), &config, Some(&summary), true)
            .await
            .unwrap();

        let log = std::fs::read_to_string(dir.path().join("AA.BB_sensor-log.csv")).unwrap();
        assert!(log.starts_with("AA:BB,"));
        assert!(log.lines().count() > 2);
        assert!(std::fs::read_to_string(summary).unwrap().contains("log: "));
    }

    #[tokio::test]
    async fn test_simulate_without_coefficients_fails() {
        let result = cmd_simulate(Duration::from_millis(10), &Config::default(), None, true).await;
        assert!(result.is_err());
    }
}
