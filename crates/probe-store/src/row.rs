//! Log row model and CSV (de)serialization.

use serde::{Deserialize, Serialize};
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time};
use tracing::warn;

use probe_types::packet::{from_hex, to_hex};
use probe_types::{Coefficients, Packet, PACKET_LEN, RawPacket, Reading};

use crate::error::{Error, Result};

/// Column names of the data rows, in order.
pub const COLUMNS: [&str; 10] = [
    "packetIndex",
    "batteryLevel",
    "reading1",
    "reading2",
    "reading3",
    "reading4",
    "avgReading",
    "time",
    "date",
    "data",
];

/// Number of lines written before the first data row.
pub const PREAMBLE_LINES: usize = 2;

/// Identity of the device a log belongs to, written as the first line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogHeader {
    /// Peripheral the samples came from.
    pub peripheral_id: String,
    /// Service holding the sampled characteristic.
    pub service_id: String,
    /// Human-readable service name.
    pub service_name: String,
}

impl LogHeader {
    pub fn new(
        peripheral_id: impl Into<String>,
        service_id: impl Into<String>,
        service_name: impl Into<String>,
    ) -> Self {
        Self {
            peripheral_id: peripheral_id.into(),
            service_id: service_id.into(),
            service_name: service_name.into(),
        }
    }

    /// The two preamble lines: device identity, then the column header.
    pub fn preamble(&self) -> Result<String> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_writer(Vec::new());
        writer.write_record([&self.peripheral_id, &self.service_id, &self.service_name])?;
        writer.write_record(COLUMNS)?;
        into_string(writer)
    }
}

/// One persisted reading.
///
/// Rows are written once and never rewritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRow {
    /// Packet index as sent by the device.
    pub packet_index: u16,
    /// Battery level in percent.
    pub battery_level: u8,
    /// First raw sample.
    pub reading1: u16,
    /// Second raw sample.
    pub reading2: u16,
    /// Third raw sample.
    pub reading3: u16,
    /// Fourth raw sample.
    pub reading4: u16,
    /// Calibrated average of the four samples.
    pub avg_reading: f64,
    /// UTC time of capture, `HH:MM:SS`.
    pub time: String,
    /// UTC date of capture, `YYYY-MM-DD`.
    pub date: String,
    /// Raw packet bytes as lowercase hex.
    pub data: String,
}

impl LogRow {
    /// Build the row for a processed reading.
    pub fn from_reading(reading: &Reading) -> Self {
        let at = reading.captured_at.to_offset(time::UtcOffset::UTC);
        let [reading1, reading2, reading3, reading4] = reading.samples;
        Self {
            packet_index: reading.packet_index,
            battery_level: reading.battery_level,
            reading1,
            reading2,
            reading3,
            reading4,
            avg_reading: reading.average,
            time: at
                .time()
                .format(format_description!("[hour]:[minute]:[second]"))
                .unwrap_or_default(),
            date: at
                .date()
                .format(format_description!("[year]-[month]-[day]"))
                .unwrap_or_default(),
            data: to_hex(&reading.raw),
        }
    }

    /// Serialize as one newline-terminated CSV line.
    pub fn to_line(&self) -> Result<String> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        writer.serialize(self)?;
        into_string(writer)
    }

    /// Capture time reconstructed from the `date` and `time` columns.
    pub fn captured_at(&self) -> Result<OffsetDateTime> {
        let invalid = |e: time::error::Parse| Error::InvalidRow {
            packet_index: self.packet_index,
            reason: format!("bad timestamp {} {}: {e}", self.date, self.time),
        };
        let date = Date::parse(&self.date, format_description!("[year]-[month]-[day]"))
            .map_err(invalid)?;
        let time = Time::parse(&self.time, format_description!("[hour]:[minute]:[second]"))
            .map_err(invalid)?;
        Ok(PrimitiveDateTime::new(date, time).assume_utc())
    }

    /// Rebuild a [`Reading`] from this row.
    ///
    /// Calibrated values are recomputed from the stored samples with
    /// `coefficients`; the logged average is kept as written.
    pub fn to_reading(&self, coefficients: &Coefficients) -> Result<Reading> {
        let packet = Packet {
            index: self.packet_index,
            battery: self.battery_level,
            samples: [self.reading1, self.reading2, self.reading3, self.reading4],
        };
        let raw = self.raw_packet(&packet)?;
        let mut reading = Reading::from_packet(&packet, raw, coefficients, self.captured_at()?);
        reading.average = self.avg_reading;
        Ok(reading)
    }

    fn raw_packet(&self, packet: &Packet) -> Result<RawPacket> {
        if let Ok(bytes) = from_hex(&self.data)
            && let Ok(raw) = <RawPacket>::try_from(bytes.as_slice())
        {
            return Ok(raw);
        }
        // Older rows may carry no usable raw column; the fields are enough.
        packet.encode().map_err(|e| Error::InvalidRow {
            packet_index: self.packet_index,
            reason: format!("{e} (data column must be {} bytes of hex)", PACKET_LEN),
        })
    }
}

/// A parsed log file.
#[derive(Debug, Clone, Default)]
pub struct LogContents {
    /// Device identity line, if present and well-formed.
    pub header: Option<LogHeader>,
    /// Data rows in file order.
    pub rows: Vec<LogRow>,
    /// Number of data lines that could not be parsed.
    pub skipped: usize,
}

/// Parse the text of a log file.
///
/// The first [`PREAMBLE_LINES`] lines are the preamble. Data lines that do not
/// parse are skipped with a warning rather than failing the whole file.
pub fn parse_log(text: &str) -> LogContents {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut contents = LogContents::default();
    for (line, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                warn!("Skipping unreadable log line {}: {}", line + 1, e);
                contents.skipped += 1;
                continue;
            }
        };

        if line == 0 {
            if record.len() == 3 {
                contents.header = Some(LogHeader::new(&record[0], &record[1], &record[2]));
            }
            continue;
        }
        if line < PREAMBLE_LINES {
            continue;
        }

        match record.deserialize::<LogRow>(None) {
            Ok(row) => contents.rows.push(row),
            Err(e) => {
                warn!("Skipping malformed log line {}: {}", line + 1, e);
                contents.skipped += 1;
            }
        }
    }
    contents
}

fn into_string(writer: csv::Writer<Vec<u8>>) -> Result<String> {
    let bytes = writer
        .into_inner()
        .map_err(|e| Error::Csv(csv::Error::from(e.into_error())))?;
    // csv only writes what it was given, which is UTF-8.
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn coeffs() -> Coefficients {
        Coefficients::new(1e-9, 1e-6, 0.01, 0.5).unwrap()
    }

    fn sample_reading() -> Reading {
        Reading::decode(
            &[0x00, 0x05, 0x64, 0xAB, 0xC1, 0x23, 0xDE, 0xF4, 0x56],
            &coeffs(),
            datetime!(2025-03-01 09:05:07 UTC),
        )
        .unwrap()
    }

    #[test]
    fn test_preamble() {
        let header = LogHeader::new("AA:BB:CC:DD:EE:FF", "180f", "Battery, custom");
        assert_eq!(
            header.preamble().unwrap(),
            "AA:BB:CC:DD:EE:FF,180f,\"Battery, custom\"\n\
             packetIndex,batteryLevel,reading1,reading2,reading3,reading4,avgReading,time,date,data\n"
        );
    }

    #[test]
    fn test_row_from_reading() {
        let row = LogRow::from_reading(&sample_reading());
        assert_eq!(row.packet_index, 5);
        assert_eq!(row.battery_level, 100);
        assert_eq!(
            [row.reading1, row.reading2, row.reading3, row.reading4],
            [0xABC, 0x123, 0xDEF, 0x456]
        );
        assert_eq!(row.time, "09:05:07");
        assert_eq!(row.date, "2025-03-01");
        assert_eq!(row.data, "000564abc123def456");

        let line = row.to_line().unwrap();
        assert!(line.starts_with("5,100,2748,291,3567,1110,"));
        assert!(line.ends_with(",09:05:07,2025-03-01,000564abc123def456\n"));
    }

    #[test]
    fn test_row_to_reading_keeps_logged_average() {
        let mut row = LogRow::from_reading(&sample_reading());
        row.avg_reading = 42.0;

        let reading = row.to_reading(&coeffs()).unwrap();
        assert_eq!(reading.packet_index, 5);
        assert_eq!(reading.average, 42.0);
        assert_eq!(reading.captured_at, datetime!(2025-03-01 09:05:07 UTC));
        assert_eq!(reading.raw_hex(), "000564abc123def456");
    }

    #[test]
    fn test_row_to_reading_without_raw_column() {
        let mut row = LogRow::from_reading(&sample_reading());
        row.data = "1,2,3".to_string();
        let reading = row.to_reading(&coeffs()).unwrap();
        assert_eq!(reading.raw_hex(), "000564abc123def456");
    }

    #[test]
    fn test_row_bad_timestamp() {
        let mut row = LogRow::from_reading(&sample_reading());
        row.date = "03/01/2025".to_string();
        assert!(matches!(
            row.to_reading(&coeffs()),
            Err(Error::InvalidRow { packet_index: 5, .. })
        ));
    }

    #[test]
    fn test_parse_log_skips_preamble_and_bad_lines() {
        let header = LogHeader::new("dev", "svc", "Sensor");
        let row = LogRow::from_reading(&sample_reading());
        let text = format!(
            "{}{}not,a,row\n{}",
            header.preamble().unwrap(),
            row.to_line().unwrap(),
            row.to_line().unwrap()
        );

        let contents = parse_log(&text);
        assert_eq!(contents.header, Some(header));
        assert_eq!(contents.rows, vec![row.clone(), row]);
        assert_eq!(contents.skipped, 1);
    }

    #[test]
    fn test_parse_empty_log() {
        let contents = parse_log("");
        assert!(contents.header.is_none());
        assert!(contents.rows.is_empty());
    }
}
