//! Routing of push notifications into a short display history.

use futures::stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use probe_types::DisplayFormat;

use crate::recent::{RecentBuffer, RecentEntry, RECENT_CAPACITY};
use crate::transport::Notification;

/// Keeps the last few notifications of one subscribed characteristic.
///
/// A notification is accepted when its characteristic id contains the
/// subscribed id, ignoring case. Transports differ in how they spell ids (short
/// vs. full 128-bit UUIDs, upper vs. lower case), so containment is used rather
/// than equality. Everything else is ignored without error.
#[derive(Debug, Clone)]
pub struct NotificationRouter {
    subscribed: String,
    format: DisplayFormat,
    recent: RecentBuffer<RecentEntry>,
}

impl NotificationRouter {
    pub fn new(characteristic_id: &str, format: DisplayFormat) -> Self {
        Self {
            subscribed: characteristic_id.to_lowercase(),
            format,
            recent: RecentBuffer::new(RECENT_CAPACITY),
        }
    }

    pub fn format(&self) -> DisplayFormat {
        self.format
    }

    /// Change how later payloads are rendered. Existing entries are kept.
    pub fn set_format(&mut self, format: DisplayFormat) {
        self.format = format;
    }

    /// Whether a characteristic id belongs to the subscription.
    pub fn matches(&self, characteristic_id: &str) -> bool {
        characteristic_id.to_lowercase().contains(&self.subscribed)
    }

    /// Handle one notification. Returns `true` if it was recorded.
    pub fn route(&mut self, notification: &Notification) -> bool {
        if !self.matches(&notification.characteristic_id) {
            trace!(
                "Ignoring notification for {}",
                notification.characteristic_id
            );
            return false;
        }
        let text = self.format.render(&notification.payload);
        debug!("Notification {}: {}", notification.characteristic_id, text);
        self.recent.push(RecentEntry::now(text));
        true
    }

    /// Recorded notifications, newest first.
    pub fn recent(&self) -> impl Iterator<Item = &RecentEntry> {
        self.recent.iter()
    }

    pub fn clear(&mut self) {
        self.recent.clear();
    }

    /// Route notifications from `stream` until it ends or `cancel` fires.
    ///
    /// Returns the number of notifications recorded.
    pub async fn run<S>(&mut self, stream: S, cancel: CancellationToken) -> usize
    where
        S: Stream<Item = Notification> + Unpin,
    {
        let mut stream = stream;
        let mut recorded = 0;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Notification routing cancelled");
                    break;
                }
                next = stream.next() => match next {
                    Some(notification) => {
                        if self.route(&notification) {
                            recorded += 1;
                        }
                    }
                    None => {
                        debug!("Notification stream ended");
                        break;
                    }
                },
            }
        }
        recorded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHAR: &str = "0000FFE1-0000-1000-8000-00805F9B34FB";

    #[test]
    fn test_routes_matching_characteristic_case_insensitively() {
        let mut router = NotificationRouter::new("ffe1", DisplayFormat::Hex);
        assert!(router.route(&Notification::new(CHAR, vec![0xAB, 0xCD])));
        assert_eq!(router.recent().next().unwrap().text, "abcd");
    }

    #[test]
    fn test_ignores_unrelated_characteristic() {
        let mut router = NotificationRouter::new("ffe1", DisplayFormat::Hex);
        assert!(!router.route(&Notification::new("2a19", vec![1])));
        assert_eq!(router.recent().count(), 0);
    }

    #[test]
    fn test_keeps_five_most_recent() {
        let mut router = NotificationRouter::new("ffe1", DisplayFormat::Decimal);
        for i in 0..8u8 {
            router.route(&Notification::new(CHAR, vec![i]));
        }
        let texts: Vec<&str> = router.recent().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["7", "6", "5", "4", "3"]);
    }

    #[test]
    fn test_format_change_applies_to_later_payloads() {
        let mut router = NotificationRouter::new("FFE1", DisplayFormat::Utf8);
        router.route(&Notification::new(CHAR, b"hi".to_vec()));
        router.set_format(DisplayFormat::Decimal);
        router.route(&Notification::new(CHAR, b"hi".to_vec()));

        let texts: Vec<&str> = router.recent().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["104,105", "hi"]);
    }

    #[tokio::test]
    async fn test_run_consumes_until_stream_ends() {
        let mut router = NotificationRouter::new("ffe1", DisplayFormat::Hex);
        let stream = futures::stream::iter(vec![
            Notification::new(CHAR, vec![1]),
            Notification::new("other", vec![2]),
            Notification::new(CHAR, vec![3]),
        ]);

        let recorded = router.run(stream, CancellationToken::new()).await;
        assert_eq!(recorded, 2);
        assert_eq!(router.recent().next().unwrap().text, "03");
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let mut router = NotificationRouter::new("ffe1", DisplayFormat::Hex);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let recorded = router.run(futures::stream::pending(), cancel).await;
        assert_eq!(recorded, 0);
    }

    #[tokio::test]
    async fn test_run_over_transport_subscription() {
        use crate::mock::MockTransport;
        use crate::transport::{CharacteristicRef, Transport};

        let transport = MockTransport::new();
        transport.push_notification(Notification::new(CHAR, b"ok".to_vec()));
        transport.push_notification(Notification::new("2a19", vec![99]));
        let stream = transport
            .notifications(&CharacteristicRef::new("AA:BB", "ffe0", "ffe1"))
            .await
            .unwrap();

        let mut router = NotificationRouter::new("ffe1", DisplayFormat::Utf8);
        assert_eq!(router.run(stream, CancellationToken::new()).await, 1);
        assert_eq!(router.recent().next().unwrap().text, "ok");
    }
}
