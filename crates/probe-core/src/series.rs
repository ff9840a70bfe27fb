//! Ordered, deduplicated store of processed readings.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, warn};

use probe_store::LogRow;
use probe_types::{Coefficients, Reading, SeriesPoint};

/// Trailing span shown by the chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TimeWindow {
    /// The whole series.
    #[default]
    All,
    LastHour,
    Last6Hours,
    Last24Hours,
}

impl TimeWindow {
    /// Map the chart's hour selector (0, 1, 6 or 24) to a window.
    ///
    /// ```
    /// use probe_core::TimeWindow;
    ///
    /// assert_eq!(TimeWindow::from_hours(0), Some(TimeWindow::All));
    /// assert_eq!(TimeWindow::from_hours(6), Some(TimeWindow::Last6Hours));
    /// assert_eq!(TimeWindow::from_hours(3), None);
    /// ```
    pub fn from_hours(hours: u32) -> Option<Self> {
        match hours {
            0 => Some(TimeWindow::All),
            1 => Some(TimeWindow::LastHour),
            6 => Some(TimeWindow::Last6Hours),
            24 => Some(TimeWindow::Last24Hours),
            _ => None,
        }
    }

    /// Length of the window, `None` for [`TimeWindow::All`].
    pub fn span(&self) -> Option<Duration> {
        let hours = match self {
            TimeWindow::All => return None,
            TimeWindow::LastHour => 1,
            TimeWindow::Last6Hours => 6,
            TimeWindow::Last24Hours => 24,
        };
        Some(Duration::from_secs(hours * 3600))
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.span() {
            None => write!(f, "all"),
            Some(span) => write!(f, "{}h", span.as_secs() / 3600),
        }
    }
}

/// Readings keyed and sorted by packet index.
///
/// At most one reading is kept per packet index; a later upsert with the same
/// index replaces the earlier one.
#[derive(Debug, Clone, Default)]
pub struct SeriesStore {
    readings: BTreeMap<u16, Reading>,
}

impl SeriesStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a reading, replacing any existing one with the same index.
    ///
    /// Returns the replaced reading, if any.
    pub fn upsert(&mut self, reading: Reading) -> Option<Reading> {
        let replaced = self.readings.insert(reading.packet_index, reading);
        if let Some(ref old) = replaced {
            debug!("Replaced reading for packet {}", old.packet_index);
        }
        replaced
    }

    /// Readings in ascending packet-index order.
    pub fn iter(&self) -> impl Iterator<Item = &Reading> {
        self.readings.values()
    }

    pub fn get(&self, packet_index: u16) -> Option<&Reading> {
        self.readings.get(&packet_index)
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Reading with the highest packet index.
    pub fn last(&self) -> Option<&Reading> {
        self.readings.values().next_back()
    }

    pub fn clear(&mut self) {
        self.readings.clear();
    }

    /// Chart points within `window`, ending at the current time.
    ///
    /// Recomputed on every call.
    pub fn windowed(&self, window: TimeWindow) -> Vec<SeriesPoint> {
        self.windowed_at(window, OffsetDateTime::now_utc())
    }

    /// Chart points whose timestamp lies in `[now - window, now]`.
    pub fn windowed_at(&self, window: TimeWindow, now: OffsetDateTime) -> Vec<SeriesPoint> {
        let points = self.readings.values().map(Reading::point);
        match window.span() {
            None => points.collect(),
            Some(span) => {
                let start = now - span;
                points
                    .filter(|p| p.timestamp >= start && p.timestamp <= now)
                    .collect()
            }
        }
    }

    /// Rehydrate from previously logged rows.
    ///
    /// Rows are upserted in file order, so a later row for the same packet
    /// index wins. Rows that cannot be converted are skipped with a warning.
    /// Returns the number of rows loaded.
    pub fn load_from_log<'a>(
        &mut self,
        rows: impl IntoIterator<Item = &'a LogRow>,
        coefficients: &Coefficients,
    ) -> usize {
        let mut loaded = 0;
        for row in rows {
            match row.to_reading(coefficients) {
                Ok(reading) => {
                    self.upsert(reading);
                    loaded += 1;
                }
                Err(e) => warn!("Skipping logged row: {}", e),
            }
        }
        loaded
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use probe_types::Packet;
    use proptest::prelude::*;

    proptest! {
        /// Any sequence of upserts iterates in strictly increasing index order.
        #[test]
        fn iteration_is_ordered(indices in proptest::collection::vec(any::<u16>(), 0..64)) {
            let coeffs = Coefficients::new(1.0, 1.0, 1.0, 1.0).unwrap();
            let mut store = SeriesStore::new();
            for index in &indices {
                let packet = Packet { index: *index, battery: 1, samples: [0; 4] };
                store.upsert(Reading::from_packet(
                    &packet,
                    packet.encode().unwrap(),
                    &coeffs,
                    OffsetDateTime::UNIX_EPOCH,
                ));
            }
            let seen: Vec<u16> = store.iter().map(|r| r.packet_index).collect();
            prop_assert!(seen.windows(2).all(|w| w[0] < w[1]));
            let unique: std::collections::BTreeSet<u16> = indices.into_iter().collect();
            prop_assert_eq!(seen.len(), unique.len());
        }
    }
}
