//! Configuration file management.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use probe_core::{CharacteristicRef, SamplingOptions, ScheduleConfig};
use probe_store::log_file_name;
use probe_types::Coefficients;

/// Configuration file structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Which characteristic to sample
    #[serde(default)]
    pub device: DeviceConfig,

    /// Burst timing
    #[serde(default)]
    pub schedule: ScheduleSection,

    /// Polynomial coefficients. Sampling is refused while unset.
    #[serde(default)]
    pub coefficients: Option<CoefficientsSection>,

    /// Where the sample log lives
    #[serde(default)]
    pub log: LogSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default = "default_peripheral_id")]
    pub peripheral_id: String,

    #[serde(default = "default_service_id")]
    pub service_id: String,

    /// Written to the first line of the log
    #[serde(default = "default_service_name")]
    pub service_name: String,

    #[serde(default = "default_characteristic_id")]
    pub characteristic_id: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            peripheral_id: default_peripheral_id(),
            service_id: default_service_id(),
            service_name: default_service_name(),
            characteristic_id: default_characteristic_id(),
        }
    }
}

fn default_peripheral_id() -> String {
    "00:00:00:00:00:00".to_string()
}

fn default_service_id() -> String {
    "0000ffe0-0000-1000-8000-00805f9b34fb".to_string()
}

fn default_service_name() -> String {
    "Sensor Probe".to_string()
}

fn default_characteristic_id() -> String {
    "0000ffe1-0000-1000-8000-00805f9b34fb".to_string()
}

/// Schedule in milliseconds, as written in the file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScheduleSection {
    #[serde(default = "default_burst_interval_ms")]
    pub burst_interval_ms: u64,

    #[serde(default = "default_listen_duration_ms")]
    pub listen_duration_ms: u64,

    #[serde(default = "default_read_period_ms")]
    pub read_period_ms: u64,

    /// Give up on a single read after this long
    #[serde(default)]
    pub read_timeout_ms: Option<u64>,
}

impl Default for ScheduleSection {
    fn default() -> Self {
        Self {
            burst_interval_ms: default_burst_interval_ms(),
            listen_duration_ms: default_listen_duration_ms(),
            read_period_ms: default_read_period_ms(),
            read_timeout_ms: None,
        }
    }
}

fn default_burst_interval_ms() -> u64 {
    6 * 60 * 1000
}

fn default_listen_duration_ms() -> u64 {
    1000
}

fn default_read_period_ms() -> u64 {
    100
}

impl From<ScheduleSection> for ScheduleConfig {
    fn from(section: ScheduleSection) -> Self {
        ScheduleConfig::from_millis(
            section.burst_interval_ms,
            section.listen_duration_ms,
            section.read_period_ms,
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CoefficientsSection {
    pub c3: f64,
    pub c2: f64,
    pub c1: f64,
    pub c0: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogSection {
    /// Log directory. Defaults to the platform data directory.
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

impl Config {
    /// Default config file path
    pub fn path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sensor-probe")
            .join("config.toml")
    }

    /// Load configuration.
    ///
    /// An explicit path must exist. The default path is optional and a
    /// missing file yields defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let path = Self::path();
                if !path.exists() {
                    tracing::debug!("No config at {}, using defaults", path.display());
                    return Ok(Self::default());
                }
                path
            }
        };
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config in {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Configured coefficients, if present and valid.
    pub fn coefficients(&self) -> Result<Option<Coefficients>> {
        self.coefficients
            .map(|c| Coefficients::new(c.c3, c.c2, c.c1, c.c0))
            .transpose()
            .context("Invalid [coefficients]")
    }

    /// Coefficients, failing when none are configured.
    pub fn require_coefficients(&self) -> Result<Coefficients> {
        self.coefficients()?.with_context(|| {
            format!(
                "No [coefficients] configured; add c3, c2, c1 and c0 to {}",
                Self::path().display()
            )
        })
    }

    pub fn target(&self) -> CharacteristicRef {
        CharacteristicRef::new(
            &self.device.peripheral_id,
            &self.device.service_id,
            &self.device.characteristic_id,
        )
    }

    pub fn log_dir(&self) -> PathBuf {
        self.log
            .directory
            .clone()
            .unwrap_or_else(probe_store::default_log_dir)
    }

    /// Path of the configured device's log file.
    pub fn log_path(&self) -> PathBuf {
        self.log_dir().join(log_file_name(&self.device.peripheral_id))
    }

    /// Options for a sampling run of the configured device.
    pub fn sampling_options(&self) -> Result<SamplingOptions> {
        let mut options = SamplingOptions::new(self.target(), self.require_coefficients()?)
            .service_name(&self.device.service_name)
            .schedule(self.schedule.into())
            .log_dir(self.log_dir());
        if let Some(ms) = self.schedule.read_timeout_ms {
            options = options.read_timeout(std::time::Duration::from_millis(ms));
        }
        options.validate().context("Invalid sampling configuration")?;
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.device.peripheral_id, "00:00:00:00:00:00");
        assert_eq!(
            ScheduleConfig::from(config.schedule),
            ScheduleConfig::default()
        );
        assert!(config.coefficients().unwrap().is_none());
    }

    #[test]
    fn test_full_config() {
        let config = Config::parse(
            r#"
            [device]
            peripheral_id = "AA:BB:CC:DD:EE:FF"
            service_name = "Soil probe"

            [schedule]
            burst_interval_ms = 2000
            listen_duration_ms = 500
            read_timeout_ms = 80

            [coefficients]
            c3 = 1e-9
            c2 = 1e-6
            c1 = 0.5
            c0 = 2.0

            [log]
            directory = "/tmp/probe-logs"
            "#,
        )
        .unwrap();

        let options = config.sampling_options().unwrap();
        assert_eq!(options.schedule.burst_interval, Duration::from_secs(2));
        assert_eq!(options.schedule.read_period, Duration::from_millis(100));
        assert_eq!(options.read_timeout, Some(Duration::from_millis(80)));
        assert_eq!(options.service_name, "Soil probe");
        assert_eq!(
            config.log_path(),
            PathBuf::from("/tmp/probe-logs/AA.BB.CC.DD.EE.FF_sensor-log.csv")
        );
    }

    #[test]
    fn test_missing_coefficients_refuse_sampling() {
        let config = Config::default();
        let err = config.sampling_options().unwrap_err();
        assert!(err.to_string().contains("No [coefficients]"));
    }

    #[test]
    fn test_zero_coefficient_is_rejected() {
        let config = Config::parse(
            r#"
            [coefficients]
            c3 = 0.0
            c2 = 1.0
            c1 = 1.0
            c0 = 1.0
            "#,
        )
        .unwrap();
        assert!(config.coefficients().is_err());
    }

    #[test]
    fn test_overlapping_schedule_is_rejected() {
        let config = Config::parse(
            r#"
            [schedule]
            burst_interval_ms = 100
            listen_duration_ms = 500

            [coefficients]
            c3 = 1.0
            c2 = 1.0
            c1 = 1.0
            c0 = 1.0
            "#,
        )
        .unwrap();
        assert!(config.sampling_options().is_err());
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load(Some(&dir.path().join("nope.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[device]\nperipheral_id = \"11:22\"\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.device.peripheral_id, "11:22");
        assert_eq!(config.device.service_name, "Sensor Probe");
    }
}
