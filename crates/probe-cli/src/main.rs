//! `probe`: drive the sensor probe sampling pipeline from the command line.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod format;
mod util;

use config::Config;

#[derive(Parser)]
#[command(name = "probe")]
#[command(author, version, about = "Sampling pipeline for BLE sensor probes", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Config file (default: platform config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Write output to file instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode one or more concatenated 9-byte packets
    Decode {
        /// Packet bytes as hex, e.g. 000564ABC123DEF456
        hex: String,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Sample synthetic packets with the configured schedule and log
    Simulate {
        /// Stop after this many seconds
        #[arg(short, long, default_value = "10")]
        duration_secs: u64,
    },

    /// Print the time-windowed series of a log
    Series {
        /// Log file (default: the configured device's log)
        #[arg(short, long)]
        log: Option<PathBuf>,

        /// Trailing window in hours: 0 (all), 1, 6 or 24
        #[arg(long, default_value = "0")]
        hours: u32,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // When quiet mode is enabled, suppress info-level logging
    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load(cli.config.as_deref())?;
    let output = cli.output.as_ref();

    match cli.command {
        Commands::Decode { hex, json } => commands::cmd_decode(&hex, json, &config, output),
        Commands::Simulate { duration_secs } => {
            commands::cmd_simulate(
                Duration::from_secs(duration_secs),
                &config,
                output,
                cli.quiet,
            )
            .await
        }
        Commands::Series { log, hours, json } => {
            commands::cmd_series(log.as_deref(), hours, json, &config, output)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_series_args() {
        let cli = Cli::parse_from(["probe", "--quiet", "series", "--hours", "6", "--json"]);
        assert!(cli.quiet);
        assert!(matches!(
            cli.command,
            Commands::Series {
                hours: 6,
                json: true,
                log: None
            }
        ));
    }

    #[test]
    fn test_parse_decode_args() {
        let cli = Cli::parse_from(["probe", "decode", "000564abc123def456"]);
        assert!(matches!(cli.command, Commands::Decode { json: false, .. }));
    }
}
