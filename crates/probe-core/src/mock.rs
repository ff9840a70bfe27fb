//! Mock transport implementation for testing.
//!
//! [`MockTransport`] implements [`Transport`] without any radio, so the
//! scheduler, writer and router can be exercised in unit tests and by the
//! `simulate` command.
//!
//! # Features
//!
//! - **Scripted reads**: queue exact byte responses or failures
//! - **Synthetic packets**: otherwise produce random valid packets with sequential indices
//! - **Failure injection**: make every operation fail with a message
//! - **Latency simulation**: delay reads to mimic a slow link
//! - **Call recording**: read instants and written payloads for assertions

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio::time::Instant;

use probe_types::{Packet, RawPacket, SAMPLE_MAX};

use crate::error::{Error, Result};
use crate::transport::{CharacteristicRef, Notification, NotificationStream, Transport, WriteMode};

/// Generate a random valid packet with the given index.
pub fn synthetic_packet(index: u16) -> RawPacket {
    let mut rng = rand::rng();
    let packet = Packet {
        index,
        battery: rng.random_range(0..=100),
        samples: std::array::from_fn(|_| rng.random_range(0..=SAMPLE_MAX)),
    };
    // Samples are drawn within 12 bits, so encoding cannot fail.
    packet.encode().unwrap_or([0; probe_types::PACKET_LEN])
}

/// Generate `count` consecutive synthetic packets concatenated in one buffer.
pub fn synthetic_packets(start_index: u16, count: usize) -> Vec<u8> {
    (0..count)
        .flat_map(|i| synthetic_packet(start_index.wrapping_add(i as u16)))
        .collect()
}

/// A transport that never touches a radio.
///
/// # Example
///
/// ```
/// use probe_core::{CharacteristicRef, MockTransport, Transport};
///
/// #[tokio::main]
/// async fn main() {
///     let transport = MockTransport::new();
///     transport.push_read(vec![0x00, 0x05, 0x64, 0xAB, 0xC1, 0x23, 0xDE, 0xF4, 0x56]);
///
///     let target = CharacteristicRef::new("AA:BB", "ffe0", "ffe1");
///     let bytes = transport.read(&target).await.unwrap();
///     assert_eq!(bytes.len(), 9);
/// }
/// ```
#[derive(Debug, Default)]
pub struct MockTransport {
    scripted: Mutex<VecDeque<std::result::Result<Vec<u8>, String>>>,
    next_index: AtomicU32,
    packets_per_read: AtomicU32,
    read_count: AtomicU32,
    read_instants: Mutex<Vec<Instant>>,
    writes: Mutex<Vec<Vec<u8>>>,
    notifications: Mutex<Vec<Notification>>,
    should_fail: AtomicBool,
    fail_message: Mutex<String>,
    /// Simulated read latency in milliseconds (0 = no delay).
    read_latency_ms: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockTransport {
    /// Create a mock that answers each read with one synthetic packet.
    pub fn new() -> Self {
        let mock = Self::default();
        mock.packets_per_read.store(1, Ordering::Relaxed);
        *lock(&mock.fail_message) = "Mock failure".to_string();
        mock
    }

    /// Queue an exact response for a future read.
    pub fn push_read(&self, bytes: Vec<u8>) {
        lock(&self.scripted).push_back(Ok(bytes));
    }

    /// Queue a failing read.
    pub fn push_read_error(&self, message: &str) {
        lock(&self.scripted).push_back(Err(message.to_string()));
    }

    /// Number of synthetic packets returned per unscripted read.
    pub fn set_packets_per_read(&self, count: u32) {
        self.packets_per_read.store(count.max(1), Ordering::Relaxed);
    }

    /// Make every operation fail.
    pub fn set_should_fail(&self, fail: bool, message: Option<&str>) {
        self.should_fail.store(fail, Ordering::Relaxed);
        if let Some(msg) = message {
            *lock(&self.fail_message) = msg.to_string();
        }
    }

    /// Delay every read by `latency`.
    pub fn set_read_latency(&self, latency: Duration) {
        self.read_latency_ms
            .store(latency.as_millis() as u64, Ordering::Relaxed);
    }

    /// Notifications handed out by [`Transport::notifications`].
    pub fn push_notification(&self, notification: Notification) {
        lock(&self.notifications).push(notification);
    }

    /// Number of reads started so far.
    pub fn read_count(&self) -> u32 {
        self.read_count.load(Ordering::Relaxed)
    }

    /// Instant at which each read started.
    pub fn read_instants(&self) -> Vec<Instant> {
        lock(&self.read_instants).clone()
    }

    /// Payloads written so far.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        lock(&self.writes).clone()
    }

    fn check_failure(&self, operation: &str) -> Result<()> {
        if self.should_fail.load(Ordering::Relaxed) {
            return Err(Error::transport(operation, lock(&self.fail_message).clone()));
        }
        Ok(())
    }

    fn next_synthetic(&self) -> Vec<u8> {
        let count = self.packets_per_read.load(Ordering::Relaxed).max(1);
        let start = self.next_index.fetch_add(count, Ordering::Relaxed);
        synthetic_packets(start as u16, count as usize)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn read(&self, _target: &CharacteristicRef) -> Result<Vec<u8>> {
        self.read_count.fetch_add(1, Ordering::Relaxed);
        lock(&self.read_instants).push(Instant::now());

        let latency = self.read_latency_ms.load(Ordering::Relaxed);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        self.check_failure("read")?;

        let scripted = lock(&self.scripted).pop_front();
        match scripted {
            Some(Ok(bytes)) => Ok(bytes),
            Some(Err(message)) => Err(Error::transport("read", message)),
            None => Ok(self.next_synthetic()),
        }
    }

    async fn write(&self, _target: &CharacteristicRef, data: &[u8], _mode: WriteMode) -> Result<()> {
        self.check_failure("write")?;
        lock(&self.writes).push(data.to_vec());
        Ok(())
    }

    async fn notifications(&self, _target: &CharacteristicRef) -> Result<NotificationStream> {
        self.check_failure("subscribe")?;
        let pending = std::mem::take(&mut *lock(&self.notifications));
        Ok(Box::pin(futures::stream::iter(pending)))
    }
}
