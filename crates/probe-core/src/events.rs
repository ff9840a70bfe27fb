//! Sampling run events.
//!
//! Failures that must not stop a run (malformed packets, transport errors,
//! persistence errors) are surfaced to the caller through these events.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use probe_types::Reading;

/// Events emitted by a [`SamplingScheduler`](crate::scheduler::SamplingScheduler).
///
/// All events are serializable for logging and IPC.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum SamplingEvent {
    /// The run passed pre-flight checks and is scheduled.
    RunStarted {
        /// Readings restored from the existing log.
        restored: usize,
    },
    /// A listen window opened.
    BurstStarted { burst: u64 },
    /// A listen window closed.
    BurstFinished { burst: u64, reads: u32 },
    /// A reading was decoded, stored and handed to the log.
    Reading { reading: Reading },
    /// A read failed at the transport.
    ReadFailed { error: String },
    /// A read returned bytes that are not a valid packet.
    MalformedPacket { error: String },
    /// The log could not be created or appended to.
    PersistenceFailed { error: String },
    /// The run was stopped.
    RunStopped,
}

/// Sender for sampling events.
pub type EventSender = broadcast::Sender<SamplingEvent>;

/// Receiver for sampling events.
pub type EventReceiver = broadcast::Receiver<SamplingEvent>;

/// Create a new event channel with the given capacity.
pub fn event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    broadcast::channel(capacity)
}

/// Send an event, ignoring the case where nobody is subscribed.
pub(crate) fn emit(sender: &EventSender, event: SamplingEvent) {
    let _ = sender.send(event);
}
