//! Transport abstraction for characteristic reads, writes and notifications.
//!
//! Connection management, pairing and service discovery live outside this
//! crate. The pipeline only needs something that can read and write bytes on
//! an already discovered characteristic, which is what [`Transport`] models.
//! [`MockTransport`](crate::mock::MockTransport) implements it for tests.

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use futures::stream::Stream;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Address of one characteristic on one peripheral.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CharacteristicRef {
    /// Peripheral identifier (MAC address or platform UUID).
    pub peripheral_id: String,
    /// Service UUID.
    pub service_id: String,
    /// Characteristic UUID.
    pub characteristic_id: String,
}

impl CharacteristicRef {
    pub fn new(
        peripheral_id: impl Into<String>,
        service_id: impl Into<String>,
        characteristic_id: impl Into<String>,
    ) -> Self {
        Self {
            peripheral_id: peripheral_id.into(),
            service_id: service_id.into(),
            characteristic_id: characteristic_id.into(),
        }
    }
}

impl fmt::Display for CharacteristicRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.peripheral_id, self.service_id, self.characteristic_id
        )
    }
}

/// Whether a write waits for the peripheral's acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WriteMode {
    #[default]
    WithResponse,
    WithoutResponse,
}

/// A value pushed by the peripheral.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Characteristic the value belongs to, as reported by the transport.
    pub characteristic_id: String,
    /// Raw payload.
    pub payload: Vec<u8>,
}

impl Notification {
    pub fn new(characteristic_id: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            characteristic_id: characteristic_id.into(),
            payload: payload.into(),
        }
    }
}

/// Boxed stream of notifications.
pub type NotificationStream = Pin<Box<dyn Stream<Item = Notification> + Send>>;

/// Byte-level access to characteristics.
///
/// # Example
///
/// ```ignore
/// use probe_core::{CharacteristicRef, Transport};
///
/// async fn dump<T: Transport>(transport: &T, target: &CharacteristicRef) -> probe_core::Result<()> {
///     let bytes = transport.read(target).await?;
///     println!("{} bytes from {}", bytes.len(), target);
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait Transport: Send + Sync {
    /// Read the current value of a characteristic.
    async fn read(&self, target: &CharacteristicRef) -> Result<Vec<u8>>;

    /// Write a value to a characteristic.
    async fn write(&self, target: &CharacteristicRef, data: &[u8], mode: WriteMode) -> Result<()>;

    /// Subscribe to value-change notifications.
    ///
    /// The default implementation returns an empty stream for transports
    /// without notification support.
    async fn notifications(&self, _target: &CharacteristicRef) -> Result<NotificationStream> {
        Ok(Box::pin(futures::stream::empty()))
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn read(&self, target: &CharacteristicRef) -> Result<Vec<u8>> {
        (**self).read(target).await
    }

    async fn write(&self, target: &CharacteristicRef, data: &[u8], mode: WriteMode) -> Result<()> {
        (**self).write(target, data, mode).await
    }

    async fn notifications(&self, target: &CharacteristicRef) -> Result<NotificationStream> {
        (**self).notifications(target).await
    }
}
