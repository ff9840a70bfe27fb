//! Append-only log sink.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use probe_types::Reading;

use crate::error::{Error, Result};
use crate::fs::{FileSystem, StdFileSystem};
use crate::row::{parse_log, LogContents, LogHeader, LogRow};

/// Suffix appended to the peripheral id to form the log file name.
pub const LOG_FILE_SUFFIX: &str = "_sensor-log.csv";

/// Log file name for a peripheral.
///
/// Colons (as found in MAC addresses) are replaced with periods so the name is
/// valid on every platform.
///
/// ```
/// assert_eq!(
///     probe_store::log_file_name("AA:BB:CC:DD:EE:FF"),
///     "AA.BB.CC.DD.EE.FF_sensor-log.csv"
/// );
/// ```
pub fn log_file_name(peripheral_id: &str) -> String {
    format!("{}{}", peripheral_id.replace(':', "."), LOG_FILE_SUFFIX)
}

/// Append-only CSV log of processed readings.
///
/// The file starts with a two-line preamble (device identity, then column
/// names) followed by one row per reading. Existing files are never truncated
/// or re-headed, and rows are never rewritten.
///
/// The sink takes `&mut self` to append, so a single owner serializes writes.
#[derive(Debug)]
pub struct LogSink<F = StdFileSystem> {
    fs: F,
    path: PathBuf,
    header: LogHeader,
    rows_written: u64,
}

impl LogSink<StdFileSystem> {
    /// Sink writing to `dir` on the real file system.
    pub fn open_in_dir(dir: impl AsRef<Path>, header: LogHeader) -> Self {
        Self::in_dir(StdFileSystem, dir, header)
    }
}

impl<F: FileSystem> LogSink<F> {
    /// Create a sink for an explicit file path.
    pub fn new(fs: F, path: impl Into<PathBuf>, header: LogHeader) -> Self {
        Self {
            fs,
            path: path.into(),
            header,
            rows_written: 0,
        }
    }

    /// Create a sink in `dir`, naming the file after the peripheral.
    pub fn in_dir(fs: F, dir: impl AsRef<Path>, header: LogHeader) -> Self {
        let path = dir.as_ref().join(log_file_name(&header.peripheral_id));
        Self::new(fs, path, header)
    }

    /// Path of the log file, for export or sharing.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Device identity written in the preamble.
    pub fn header(&self) -> &LogHeader {
        &self.header
    }

    /// Rows successfully appended through this sink.
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Make sure the log file exists.
    ///
    /// Creates the containing directory if needed. If the file is missing it is
    /// created with the preamble; if it already exists nothing is written.
    ///
    /// Returns `true` if the file was created by this call.
    pub fn ensure_created(&self) -> Result<bool> {
        self.ensure_directory()?;

        if self.fs.exists(&self.path) {
            debug!("Log file {} already exists, keeping it", self.path.display());
            return Ok(false);
        }

        let preamble = self.header.preamble()?;
        self.fs
            .write_file(&self.path, &preamble)
            .map_err(|source| Error::Create {
                path: self.path.clone(),
                source,
            })?;
        info!("Created log file {}", self.path.display());
        Ok(true)
    }

    /// Append one reading as one row.
    ///
    /// A missing file is created with its preamble first, so a log whose
    /// creation failed earlier recovers on the next append.
    pub fn append(&mut self, reading: &Reading) -> Result<()> {
        if !self.fs.exists(&self.path) {
            self.ensure_created()?;
        }

        let line = LogRow::from_reading(reading).to_line()?;
        self.fs
            .append_file(&self.path, &line)
            .map_err(|source| Error::Append {
                path: self.path.clone(),
                source,
            })?;
        self.rows_written += 1;
        Ok(())
    }

    /// Read the log back. A missing file yields empty contents.
    pub fn load(&self) -> Result<LogContents> {
        if !self.fs.exists(&self.path) {
            debug!("No log at {} yet", self.path.display());
            return Ok(LogContents::default());
        }
        let text = self.fs.read_file(&self.path).map_err(|source| Error::Read {
            path: self.path.clone(),
            source,
        })?;
        Ok(parse_log(&text))
    }

    fn ensure_directory(&self) -> Result<()> {
        let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) else {
            return Ok(());
        };
        if !self.fs.exists(parent) {
            self.fs
                .create_dir_all(parent)
                .map_err(|source| Error::CreateDirectory {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::fs::MemoryFileSystem;
    use crate::row::PREAMBLE_LINES;
    use probe_types::{Coefficients, Packet};
    use time::macros::datetime;

    fn header() -> LogHeader {
        LogHeader::new("AA:BB:CC:DD:EE:FF", "0000ffe0", "Probe")
    }

    fn reading(index: u16) -> Reading {
        let packet = Packet {
            index,
            battery: 80,
            samples: [100, 200, 300, 400],
        };
        let raw = packet.encode().unwrap();
        Reading::from_packet(
            &packet,
            raw,
            &Coefficients::new(1e-9, 1e-6, 0.01, 0.5).unwrap(),
            datetime!(2025-03-01 10:00 UTC),
        )
    }

    #[test]
    fn test_file_name_in_dir() {
        let sink = LogSink::in_dir(MemoryFileSystem::new(), "logs", header());
        assert_eq!(sink.path(), Path::new("logs/AA.BB.CC.DD.EE.FF_sensor-log.csv"));
    }

    #[test]
    fn test_ensure_created_is_idempotent() {
        let fs = Arc::new(MemoryFileSystem::new());
        let sink = LogSink::in_dir(fs.clone(), "data/logs", header());

        assert!(sink.ensure_created().unwrap());
        assert!(!sink.ensure_created().unwrap());
        assert!(fs.has_dir(Path::new("data/logs")));

        let text = fs.contents(sink.path()).unwrap();
        assert_eq!(text.matches("packetIndex,batteryLevel").count(), 1);
        assert_eq!(text.lines().count(), PREAMBLE_LINES);
    }

    #[test]
    fn test_ensure_created_preserves_existing_rows() {
        let fs = Arc::new(MemoryFileSystem::new());
        let mut sink = LogSink::in_dir(fs.clone(), "logs", header());
        sink.ensure_created().unwrap();
        sink.append(&reading(1)).unwrap();

        let reopened = LogSink::in_dir(fs.clone(), "logs", header());
        assert!(!reopened.ensure_created().unwrap());
        assert_eq!(reopened.load().unwrap().rows.len(), 1);
    }

    #[test]
    fn test_append_rows_in_call_order() {
        let fs = Arc::new(MemoryFileSystem::new());
        let mut sink = LogSink::in_dir(fs.clone(), "logs", header());
        sink.ensure_created().unwrap();

        for index in [3, 1, 2] {
            sink.append(&reading(index)).unwrap();
        }

        let contents = sink.load().unwrap();
        let indices: Vec<u16> = contents.rows.iter().map(|r| r.packet_index).collect();
        assert_eq!(indices, vec![3, 1, 2]);
        assert_eq!(sink.rows_written(), 3);
        assert_eq!(contents.header, Some(header()));
    }

    #[test]
    fn test_failed_append_is_reported_and_later_appends_continue() {
        let fs = Arc::new(MemoryFileSystem::new());
        let mut sink = LogSink::in_dir(fs.clone(), "logs", header());
        sink.ensure_created().unwrap();

        fs.fail_next_appends(1);
        assert!(matches!(sink.append(&reading(1)), Err(Error::Append { .. })));
        sink.append(&reading(2)).unwrap();

        let rows = sink.load().unwrap().rows;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].packet_index, 2);
        assert_eq!(sink.rows_written(), 1);
    }

    #[test]
    fn test_create_failure_is_reported() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.fail_next_writes(1);
        let sink = LogSink::in_dir(fs, "logs", header());
        assert!(matches!(sink.ensure_created(), Err(Error::Create { .. })));
    }

    #[test]
    fn test_append_recovers_after_failed_creation() {
        let fs = Arc::new(MemoryFileSystem::new());
        let mut sink = LogSink::in_dir(fs.clone(), "logs", header());

        fs.fail_next_writes(1);
        assert!(sink.ensure_created().is_err());
        assert!(fs.contents(sink.path()).is_none());

        sink.append(&reading(1)).unwrap();
        sink.append(&reading(2)).unwrap();

        let text = fs.contents(sink.path()).unwrap();
        assert!(text.starts_with("AA:BB:CC:DD:EE:FF,0000ffe0,Probe\n"));
        assert_eq!(text.lines().count(), PREAMBLE_LINES + 2);
        assert_eq!(sink.load().unwrap().header, Some(header()));
        assert_eq!(sink.rows_written(), 2);
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let sink = LogSink::in_dir(MemoryFileSystem::new(), "logs", header());
        let contents = sink.load().unwrap();
        assert!(contents.rows.is_empty());
        assert!(contents.header.is_none());
    }

    #[test]
    fn test_real_file_system_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested").join("logs");
        let mut sink = LogSink::open_in_dir(&nested, header());

        assert!(sink.ensure_created().unwrap());
        sink.append(&reading(7)).unwrap();
        sink.append(&reading(8)).unwrap();
        assert!(!sink.ensure_created().unwrap());

        let text = std::fs::read_to_string(sink.path()).unwrap();
        assert_eq!(text.lines().count(), PREAMBLE_LINES + 2);
        assert!(text.starts_with("AA:BB:CC:DD:EE:FF,0000ffe0,Probe\n"));
    }
}
