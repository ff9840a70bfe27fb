//! Writing user-entered values to a characteristic.

use tracing::{debug, warn};

use probe_types::DisplayFormat;

use crate::error::{Error, Result};
use crate::recent::{RecentBuffer, RecentEntry, RECENT_CAPACITY};
use crate::transport::{CharacteristicRef, Transport, WriteMode};

/// Parses text in a display format, writes it, and remembers recent writes.
#[derive(Debug)]
pub struct CharacteristicWriter<T> {
    transport: T,
    target: CharacteristicRef,
    recent: RecentBuffer<RecentEntry>,
}

impl<T: Transport> CharacteristicWriter<T> {
    pub fn new(transport: T, target: CharacteristicRef) -> Self {
        Self {
            transport,
            target,
            recent: RecentBuffer::new(RECENT_CAPACITY),
        }
    }

    pub fn target(&self) -> &CharacteristicRef {
        &self.target
    }

    /// Parse `text` according to `format` and write the bytes.
    ///
    /// Input that does not match the format is rejected before anything is
    /// sent. On success the written value, rendered back in `format`, is
    /// recorded and the bytes are returned.
    pub async fn write_text(
        &mut self,
        text: &str,
        format: DisplayFormat,
        mode: WriteMode,
    ) -> Result<Vec<u8>> {
        let bytes = format.parse(text).map_err(Error::InvalidInput)?;
        debug!("Writing {} bytes to {}", bytes.len(), self.target);

        if let Err(e) = self.transport.write(&self.target, &bytes, mode).await {
            warn!("Write to {} failed: {}", self.target, e);
            return Err(e);
        }

        self.recent.push(RecentEntry::now(format.render(&bytes)));
        Ok(bytes)
    }

    /// Successful writes, newest first.
    pub fn recent(&self) -> impl Iterator<Item = &RecentEntry> {
        self.recent.iter()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::mock::MockTransport;

    fn target() -> CharacteristicRef {
        CharacteristicRef::new("AA:BB", "ffe0", "ffe1")
    }

    #[tokio::test]
    async fn test_write_hex_records_value() {
        let transport = Arc::new(MockTransport::new());
        let mut writer = CharacteristicWriter::new(transport.clone(), target());

        let bytes = writer
            .write_text("0A0B", DisplayFormat::Hex, WriteMode::WithResponse)
            .await
            .unwrap();

        assert_eq!(bytes, vec![0x0A, 0x0B]);
        assert_eq!(transport.writes(), vec![vec![0x0A, 0x0B]]);
        assert_eq!(writer.recent().next().unwrap().text, "0a0b");
    }

    #[tokio::test]
    async fn test_invalid_text_is_not_sent() {
        let transport = Arc::new(MockTransport::new());
        let mut writer = CharacteristicWriter::new(transport.clone(), target());

        let result = writer
            .write_text("12x", DisplayFormat::Decimal, WriteMode::WithoutResponse)
            .await;

        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert!(transport.writes().is_empty());
        assert_eq!(writer.recent().count(), 0);
    }

    #[tokio::test]
    async fn test_transport_failure_is_surfaced() {
        let transport = Arc::new(MockTransport::new());
        transport.set_should_fail(true, Some("link lost"));
        let mut writer = CharacteristicWriter::new(transport, target());

        let result = writer
            .write_text("hi", DisplayFormat::Utf8, WriteMode::WithResponse)
            .await;

        assert!(matches!(result, Err(Error::Transport { .. })));
        assert_eq!(writer.recent().count(), 0);
    }
}
