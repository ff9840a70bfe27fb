//! Timed acquisition of sensor packets.
//!
//! A run repeats *bursts*: every `burst_interval` the scheduler opens a listen
//! window of `listen_duration` and reads the characteristic every
//! `read_period` inside it. The first burst starts immediately.
//!
//! ```text
//! burst 1                          burst 2
//! |r  r  r  r  r|..................|r  r  r  r  r|....
//! 0             listen             burst_interval
//! ```
//!
//! Every successful read is decoded, transformed, upserted into the
//! [`SeriesStore`] and appended to the log, in that order, under one lock so
//! log rows are written one at a time in the order readings are produced.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use probe_store::{FileSystem, LogHeader, LogSink, StdFileSystem};
use probe_types::{Coefficients, Reading, SeriesPoint, decode_many};

use crate::error::{Error, Result};
use crate::events::{EventReceiver, EventSender, SamplingEvent, emit, event_channel};
use crate::series::{SeriesStore, TimeWindow};
use crate::transport::{CharacteristicRef, Transport};

/// Timing of a sampling run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Time between the starts of consecutive bursts.
    pub burst_interval: Duration,
    /// How long each burst keeps reading.
    pub listen_duration: Duration,
    /// Time between reads inside a burst.
    pub read_period: Duration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            burst_interval: Duration::from_secs(6 * 60),
            listen_duration: Duration::from_secs(1),
            read_period: Duration::from_millis(100),
        }
    }
}

impl ScheduleConfig {
    pub fn from_millis(burst_interval: u64, listen_duration: u64, read_period: u64) -> Self {
        Self {
            burst_interval: Duration::from_millis(burst_interval),
            listen_duration: Duration::from_millis(listen_duration),
            read_period: Duration::from_millis(read_period),
        }
    }

    /// Check that a burst fits its period and reads fit the burst.
    ///
    /// Requires `read_period > 0`, `listen_duration >= read_period` and
    /// `burst_interval >= listen_duration`, so bursts never overlap.
    pub fn validate(&self) -> Result<()> {
        if self.read_period.is_zero() {
            return Err(Error::invalid_schedule("read period must be > 0"));
        }
        if self.listen_duration < self.read_period {
            return Err(Error::invalid_schedule(format!(
                "listen duration {:?} is shorter than read period {:?}",
                self.listen_duration, self.read_period
            )));
        }
        if self.burst_interval < self.listen_duration {
            return Err(Error::invalid_schedule(format!(
                "burst interval {:?} is shorter than listen duration {:?}",
                self.burst_interval, self.listen_duration
            )));
        }
        Ok(())
    }

    /// Number of reads attempted per burst when reads are instantaneous.
    pub fn reads_per_burst(&self) -> u32 {
        if self.read_period.is_zero() {
            return 0;
        }
        let reads = self
            .listen_duration
            .as_nanos()
            .div_ceil(self.read_period.as_nanos());
        u32::try_from(reads).unwrap_or(u32::MAX)
    }
}

/// Everything a run needs, fixed for the run's lifetime.
///
/// ```
/// use std::time::Duration;
/// use probe_core::{CharacteristicRef, SamplingOptions, ScheduleConfig};
/// use probe_types::Coefficients;
///
/// let options = SamplingOptions::new(
///     CharacteristicRef::new("AA:BB:CC:DD:EE:FF", "ffe0", "ffe1"),
///     Coefficients::new(1e-9, 1e-6, 0.5, 2.0).unwrap(),
/// )
/// .service_name("Probe")
/// .schedule(ScheduleConfig::from_millis(2000, 500, 100))
/// .read_timeout(Duration::from_millis(80));
///
/// assert!(options.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct SamplingOptions {
    /// Characteristic read on every tick.
    pub target: CharacteristicRef,
    /// Human-readable service name written to the log preamble.
    pub service_name: String,
    /// Calibration applied to every sample.
    pub coefficients: Coefficients,
    /// Burst timing.
    pub schedule: ScheduleConfig,
    /// Directory holding the log file.
    pub log_dir: PathBuf,
    /// Abandon a read that takes longer than this. `None` waits indefinitely.
    pub read_timeout: Option<Duration>,
}

impl SamplingOptions {
    pub fn new(target: CharacteristicRef, coefficients: Coefficients) -> Self {
        Self {
            target,
            service_name: String::new(),
            coefficients,
            schedule: ScheduleConfig::default(),
            log_dir: probe_store::default_log_dir(),
            read_timeout: None,
        }
    }

    #[must_use]
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    #[must_use]
    pub fn schedule(mut self, schedule: ScheduleConfig) -> Self {
        self.schedule = schedule;
        self
    }

    #[must_use]
    pub fn log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = dir.into();
        self
    }

    #[must_use]
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Pre-flight checks performed by [`SamplingScheduler::start`].
    pub fn validate(&self) -> Result<()> {
        self.coefficients.validate()?;
        self.schedule.validate()
    }

    fn log_header(&self) -> LogHeader {
        LogHeader::new(
            &self.target.peripheral_id,
            &self.target.service_id,
            &self.service_name,
        )
    }
}

/// Lifecycle of a [`SamplingScheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    /// Never started.
    #[default]
    Idle,
    /// Pre-flight checks and log rehydration in progress.
    Scheduling,
    /// Bursts are being scheduled.
    Running,
    /// A run was stopped. It may be started again.
    Stopped,
}

/// Counters for the current run. Reset by [`SamplingScheduler::stop`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Bursts started.
    pub bursts: u64,
    /// Reads that completed, successfully or not.
    pub reads: u64,
    /// Reads that failed or timed out.
    pub read_failures: u64,
    /// Reads dropped because their bytes did not decode.
    pub malformed: u64,
    /// Packets decoded into readings.
    pub readings: u64,
    /// Log rows appended.
    pub rows_written: u64,
    /// Log appends that failed.
    pub persistence_failures: u64,
}

#[derive(Debug)]
struct Pipeline<F> {
    coefficients: Coefficients,
    series: SeriesStore,
    sink: LogSink<Arc<F>>,
    latest: Option<Reading>,
    stats: RunStats,
}

impl<F: FileSystem> Pipeline<F> {
    /// Decode one read and feed every packet through store and log.
    fn ingest(&mut self, bytes: &[u8], events: &EventSender) {
        let packets = match decode_many(bytes) {
            Ok(packets) => packets,
            Err(e) => {
                warn!("Dropping malformed read ({} bytes): {}", bytes.len(), e);
                self.stats.malformed += 1;
                emit(
                    events,
                    SamplingEvent::MalformedPacket {
                        error: e.to_string(),
                    },
                );
                return;
            }
        };

        for (packet, raw) in packets {
            let reading = Reading::from_packet(
                &packet,
                raw,
                &self.coefficients,
                OffsetDateTime::now_utc(),
            );
            debug!(
                "Packet {} battery {}% avg {:.3}",
                reading.packet_index, reading.battery_level, reading.average
            );
            self.series.upsert(reading.clone());

            if let Err(e) = self.sink.append(&reading) {
                warn!("Failed to log packet {}: {}", reading.packet_index, e);
                self.stats.persistence_failures += 1;
                emit(
                    events,
                    SamplingEvent::PersistenceFailed {
                        error: e.to_string(),
                    },
                );
            } else {
                self.stats.rows_written += 1;
            }

            self.stats.readings += 1;
            self.latest = Some(reading.clone());
            emit(events, SamplingEvent::Reading { reading });
        }
    }

    fn reset(&mut self) {
        self.series.clear();
        self.latest = None;
        self.stats = RunStats::default();
    }
}

type SharedPipeline<F> = Arc<Mutex<Pipeline<F>>>;

fn lock<F>(pipeline: &SharedPipeline<F>) -> MutexGuard<'_, Pipeline<F>> {
    pipeline
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug)]
struct ActiveRun {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owns one characteristic's sampling run, its series and its log.
///
/// `start` and `stop` must be called from within a Tokio runtime.
///
/// ```no_run
/// use std::sync::Arc;
/// use probe_core::{CharacteristicRef, MockTransport, SamplingOptions, SamplingScheduler, TimeWindow};
/// use probe_types::Coefficients;
///
/// # async fn run() -> probe_core::Result<()> {
/// let mut scheduler = SamplingScheduler::new(Arc::new(MockTransport::new()));
/// scheduler.start(SamplingOptions::new(
///     CharacteristicRef::new("AA:BB:CC:DD:EE:FF", "ffe0", "ffe1"),
///     Coefficients::new(1e-9, 1e-6, 0.5, 2.0)?,
/// ))?;
///
/// let mut events = scheduler.subscribe();
/// while let Ok(event) = events.recv().await {
///     println!("{event:?}");
///     println!("{} points", scheduler.windowed(TimeWindow::LastHour).len());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SamplingScheduler<T, F = StdFileSystem> {
    transport: Arc<T>,
    fs: Arc<F>,
    events: EventSender,
    state: SchedulerState,
    pipeline: Option<SharedPipeline<F>>,
    run: Option<ActiveRun>,
}

/// Default capacity of the event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

impl<T: Transport + 'static> SamplingScheduler<T, StdFileSystem> {
    /// Scheduler that logs to the real file system.
    pub fn new(transport: Arc<T>) -> Self {
        Self::with_file_system(transport, StdFileSystem)
    }
}

impl<T, F> SamplingScheduler<T, F>
where
    T: Transport + 'static,
    F: FileSystem + 'static,
{
    pub fn with_file_system(transport: Arc<T>, fs: F) -> Self {
        let (events, _) = event_channel(DEFAULT_EVENT_CAPACITY);
        Self {
            transport,
            fs: Arc::new(fs),
            events,
            state: SchedulerState::Idle,
            pipeline: None,
            run: None,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.run.is_some()
    }

    /// Subscribe to run events.
    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }

    /// Start sampling.
    ///
    /// Coefficients and schedule are checked first; on failure nothing is
    /// read and the scheduler keeps its previous state. The log is then
    /// created if missing and its rows restored into the series. A log that
    /// cannot be created or read is reported but does not prevent the run.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyRunning`] if a run is active, [`Error::Configuration`]
    /// if the options are invalid.
    pub fn start(&mut self, options: SamplingOptions) -> Result<()> {
        if self.run.is_some() {
            return Err(Error::AlreadyRunning);
        }
        options.validate()?;

        self.state = SchedulerState::Scheduling;
        info!(
            "Starting sampling of {} every {:?}",
            options.target, options.schedule.burst_interval
        );

        let sink = LogSink::in_dir(self.fs.clone(), &options.log_dir, options.log_header());
        if let Err(e) = sink.ensure_created() {
            warn!("Could not create log {}: {}", sink.path().display(), e);
            emit(
                &self.events,
                SamplingEvent::PersistenceFailed {
                    error: e.to_string(),
                },
            );
        }

        let mut series = SeriesStore::new();
        let restored = match sink.load() {
            Ok(contents) => series.load_from_log(&contents.rows, &options.coefficients),
            Err(e) => {
                warn!("Could not read log {}: {}", sink.path().display(), e);
                0
            }
        };
        if restored > 0 {
            info!("Restored {} readings from {}", restored, sink.path().display());
        }

        let pipeline = Arc::new(Mutex::new(Pipeline {
            coefficients: options.coefficients,
            series,
            sink,
            latest: None,
            stats: RunStats::default(),
        }));

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_loop(
            self.transport.clone(),
            options,
            pipeline.clone(),
            self.events.clone(),
            cancel.clone(),
        ));

        self.pipeline = Some(pipeline);
        self.run = Some(ActiveRun { cancel, handle });
        self.state = SchedulerState::Running;
        emit(&self.events, SamplingEvent::RunStarted { restored });
        Ok(())
    }

    /// Stop sampling.
    ///
    /// Pending waits are cancelled before this returns, so no further read is
    /// issued. A read already in flight is abandoned and its result never
    /// reaches the series or the log. The in-memory series and counters are cleared; the log is
    /// left untouched.
    pub fn stop(&mut self) -> Result<()> {
        self.end_run().map(drop)
    }

    /// Stop and wait for the background task to exit.
    pub async fn shutdown(&mut self) -> Result<()> {
        let handle = self.end_run()?;
        if let Err(e) = handle.await {
            warn!("Sampling task ended abnormally: {}", e);
        }
        Ok(())
    }

    fn end_run(&mut self) -> Result<JoinHandle<()>> {
        let run = self.run.take().ok_or(Error::NotRunning)?;
        run.cancel.cancel();
        if let Some(pipeline) = &self.pipeline {
            lock(pipeline).reset();
        }
        self.state = SchedulerState::Stopped;
        info!("Sampling stopped");
        emit(&self.events, SamplingEvent::RunStopped);
        Ok(run.handle)
    }

    /// Chart points for `window`, recomputed on every call.
    pub fn windowed(&self, window: TimeWindow) -> Vec<SeriesPoint> {
        self.pipeline
            .as_ref()
            .map(|p| lock(p).series.windowed(window))
            .unwrap_or_default()
    }

    /// Snapshot of the series in packet-index order.
    pub fn readings(&self) -> Vec<Reading> {
        self.pipeline
            .as_ref()
            .map(|p| lock(p).series.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Most recent reading of the current run.
    pub fn latest(&self) -> Option<Reading> {
        self.pipeline.as_ref().and_then(|p| lock(p).latest.clone())
    }

    pub fn stats(&self) -> RunStats {
        self.pipeline
            .as_ref()
            .map(|p| lock(p).stats)
            .unwrap_or_default()
    }

    /// Path of the log of the current or last run.
    pub fn log_path(&self) -> Option<PathBuf> {
        self.pipeline
            .as_ref()
            .map(|p| lock(p).sink.path().to_path_buf())
    }
}

impl<T, F> Drop for SamplingScheduler<T, F> {
    fn drop(&mut self) {
        if let Some(run) = &self.run {
            run.cancel.cancel();
        }
    }
}

async fn run_loop<T, F>(
    transport: Arc<T>,
    options: SamplingOptions,
    pipeline: SharedPipeline<F>,
    events: EventSender,
    cancel: CancellationToken,
) where
    T: Transport,
    F: FileSystem,
{
    let schedule = options.schedule;
    let mut bursts = interval(schedule.burst_interval);
    bursts.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut burst: u64 = 0;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = bursts.tick() => {}
        }

        burst += 1;
        debug!("Burst {} started", burst);
        emit(&events, SamplingEvent::BurstStarted { burst });
        lock(&pipeline).stats.bursts += 1;

        let Some(reads) = run_burst(&*transport, &options, &pipeline, &events, &cancel).await
        else {
            break;
        };

        debug!("Burst {} finished after {} reads", burst, reads);
        emit(&events, SamplingEvent::BurstFinished { burst, reads });
    }
    debug!("Sampling loop for {} exited", options.target);
}

/// Read every `read_period` until the listen window closes.
///
/// Returns the number of reads issued, or `None` if cancelled.
async fn run_burst<T, F>(
    transport: &T,
    options: &SamplingOptions,
    pipeline: &SharedPipeline<F>,
    events: &EventSender,
    cancel: &CancellationToken,
) -> Option<u32>
where
    T: Transport,
    F: FileSystem,
{
    let schedule = options.schedule;
    let start = Instant::now();
    let mut ticks = interval_at(start, schedule.read_period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut reads = 0;

    loop {
        let tick = tokio::select! {
            _ = cancel.cancelled() => return None,
            tick = ticks.tick() => tick,
        };
        if tick.duration_since(start) >= schedule.listen_duration {
            return Some(reads);
        }

        reads += 1;
        let result = tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Abandoning read in flight at stop");
                return None;
            }
            result = read_once(transport, options) => result,
        };

        let mut pipeline = lock(pipeline);
        if cancel.is_cancelled() {
            debug!("Discarding read that completed after stop");
            return None;
        }
        pipeline.stats.reads += 1;
        match result {
            Ok(bytes) => pipeline.ingest(&bytes, events),
            Err(e) => {
                warn!("Read of {} failed: {}", options.target, e);
                pipeline.stats.read_failures += 1;
                emit(
                    events,
                    SamplingEvent::ReadFailed {
                        error: e.to_string(),
                    },
                );
            }
        }
    }
}

async fn read_once<T: Transport>(transport: &T, options: &SamplingOptions) -> Result<Vec<u8>> {
    match options.read_timeout {
        Some(limit) => tokio::time::timeout(limit, transport.read(&options.target))
            .await
            .map_err(|_| Error::timeout("read", limit))?,
        None => transport.read(&options.target).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule_is_valid() {
        let schedule = ScheduleConfig::default();
        assert!(schedule.validate().is_ok());
        assert_eq!(schedule.reads_per_burst(), 10);
    }

    #[test]
    fn test_reads_per_burst_saturates() {
        let schedule = ScheduleConfig {
            burst_interval: Duration::MAX,
            listen_duration: Duration::MAX,
            read_period: Duration::from_nanos(1),
        };
        assert_eq!(schedule.reads_per_burst(), u32::MAX);
    }

    #[test]
    fn test_schedule_rejects_zero_read_period() {
        let schedule = ScheduleConfig::from_millis(2000, 500, 0);
        assert!(matches!(schedule.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_schedule_rejects_overlapping_bursts() {
        let schedule = ScheduleConfig::from_millis(400, 500, 100);
        let err = schedule.validate().unwrap_err();
        assert!(err.to_string().contains("burst interval"));
    }

    #[test]
    fn test_schedule_rejects_listen_shorter_than_period() {
        let schedule = ScheduleConfig::from_millis(2000, 50, 100);
        assert!(schedule.validate().is_err());
    }

    #[test]
    fn test_reads_per_burst() {
        assert_eq!(ScheduleConfig::from_millis(2000, 500, 100).reads_per_burst(), 5);
        assert_eq!(ScheduleConfig::from_millis(2000, 550, 100).reads_per_burst(), 6);
    }

    #[test]
    fn test_options_reject_zero_coefficient() {
        let coefficients = Coefficients {
            c3: 0.0,
            c2: 1.0,
            c1: 1.0,
            c0: 1.0,
        };
        let options = SamplingOptions::new(
            CharacteristicRef::new("AA:BB", "ffe0", "ffe1"),
            coefficients,
        );
        assert!(matches!(options.validate(), Err(Error::Configuration(_))));
    }
}
