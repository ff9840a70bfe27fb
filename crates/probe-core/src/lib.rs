//! Sampling and aggregation pipeline for BLE sensor probes.
//!
//! This crate turns raw characteristic reads into an ordered, calibrated,
//! persisted time series. The radio itself sits behind the [`Transport`]
//! trait; connection management and service discovery happen elsewhere.
//!
//! # Features
//!
//! - **Timed acquisition**: bursts of reads at a fixed period, repeated at a fixed interval
//! - **Calibration**: a cubic polynomial applied to every 12-bit sample
//! - **Deduplication**: one reading per packet index, last write wins
//! - **Windowed views**: the whole series or the last 1, 6 or 24 hours
//! - **Persistence**: every reading appended to a CSV log, restored on restart
//! - **Notifications**: a short, formatted history of pushed values
//!
//! # Pipeline
//!
//! ```text
//! Transport::read -> decode_many -> Coefficients::apply -> SeriesStore::upsert
//!                                                       -> LogSink::append
//! ```
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use probe_core::{
//!     CharacteristicRef, MockTransport, SamplingEvent, SamplingOptions, SamplingScheduler,
//!     ScheduleConfig, TimeWindow,
//! };
//! use probe_types::Coefficients;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut scheduler = SamplingScheduler::new(Arc::new(MockTransport::new()));
//!     let options = SamplingOptions::new(
//!         CharacteristicRef::new("AA:BB:CC:DD:EE:FF", "ffe0", "ffe1"),
//!         Coefficients::new(1e-9, 1e-6, 0.5, 2.0)?,
//!     )
//!     .schedule(ScheduleConfig::from_millis(2000, 500, 100));
//!
//!     let mut events = scheduler.subscribe();
//!     scheduler.start(options)?;
//!
//!     while let Ok(event) = events.recv().await {
//!         if let SamplingEvent::Reading { reading } = event {
//!             println!("#{} avg {:.2}", reading.packet_index, reading.average);
//!         }
//!         if scheduler.stats().readings >= 10 {
//!             break;
//!         }
//!     }
//!
//!     println!("{} points in the last hour", scheduler.windowed(TimeWindow::LastHour).len());
//!     scheduler.stop()?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod events;
pub mod mock;
pub mod notify;
pub mod recent;
pub mod scheduler;
pub mod series;
pub mod transport;
pub mod writer;

pub use error::{Error, Result};
pub use events::{EventReceiver, EventSender, SamplingEvent};
pub use mock::{MockTransport, synthetic_packet, synthetic_packets};
pub use notify::NotificationRouter;
pub use recent::{RECENT_CAPACITY, RecentBuffer, RecentEntry};
pub use scheduler::{RunStats, SamplingOptions, SamplingScheduler, ScheduleConfig, SchedulerState};
pub use series::{SeriesStore, TimeWindow};
pub use transport::{CharacteristicRef, Notification, NotificationStream, Transport, WriteMode};
pub use writer::CharacteristicWriter;

// Re-export from probe-types
pub use probe_types::{Coefficients, DisplayFormat, Packet, Reading, SeriesPoint};
