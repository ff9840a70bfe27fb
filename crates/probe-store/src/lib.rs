//! Local persistence for sensor probe readings.
//!
//! This crate writes every processed reading to an append-only CSV log and
//! reads the log back so a restarted run can continue from prior history.
//!
//! # File format
//!
//! ```text
//! <peripheralId>,<serviceId>,<serviceName>
//! packetIndex,batteryLevel,reading1,reading2,reading3,reading4,avgReading,time,date,data
//! <one row per reading>
//! ```
//!
//! # Example
//!
//! ```no_run
//! use probe_store::{LogHeader, LogSink};
//!
//! let header = LogHeader::new("AA:BB:CC:DD:EE:FF", "0000ffe0", "Probe");
//! let sink = LogSink::open_in_dir(probe_store::default_log_dir(), header);
//! sink.ensure_created()?;
//! println!("{} rows so far", sink.load()?.rows.len());
//! # Ok::<(), probe_store::Error>(())
//! ```

mod error;
pub mod fs;
mod row;
mod sink;

pub use error::{Error, Result};
pub use fs::{FileSystem, MemoryFileSystem, StdFileSystem};
pub use row::{parse_log, LogContents, LogHeader, LogRow, COLUMNS, PREAMBLE_LINES};
pub use sink::{log_file_name, LogSink, LOG_FILE_SUFFIX};

/// Default log directory following platform conventions.
///
/// - Linux: `~/.local/share/sensor-probe/logs`
/// - macOS: `~/Library/Application Support/sensor-probe/logs`
/// - Windows: `C:\Users\<user>\AppData\Local\sensor-probe\logs`
pub fn default_log_dir() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("sensor-probe")
        .join("logs")
}
