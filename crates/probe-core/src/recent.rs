//! Bounded newest-first history buffer.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Number of entries kept by notification and write histories.
pub const RECENT_CAPACITY: usize = 5;

/// A fixed-capacity buffer that evicts its oldest entry when full.
#[derive(Debug, Clone)]
pub struct RecentBuffer<T> {
    entries: VecDeque<T>,
    capacity: usize,
}

impl<T> RecentBuffer<T> {
    /// Create a buffer holding at most `capacity` entries (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Add an entry, evicting the oldest if full.
    pub fn push(&mut self, entry: T) {
        if self.entries.len() == self.capacity {
            self.entries.pop_back();
        }
        self.entries.push_front(entry);
    }

    /// Entries from newest to oldest.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&T> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<T> Default for RecentBuffer<T> {
    fn default() -> Self {
        Self::new(RECENT_CAPACITY)
    }
}

/// A rendered value with the time it was seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentEntry {
    pub text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub at: OffsetDateTime,
}

impl RecentEntry {
    pub fn now(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            at: OffsetDateTime::now_utc(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_oldest() {
        let mut buf = RecentBuffer::new(5);
        for i in 0..7 {
            buf.push(i);
        }
        assert_eq!(buf.len(), 5);
        assert_eq!(buf.iter().copied().collect::<Vec<_>>(), vec![6, 5, 4, 3, 2]);
        assert_eq!(buf.latest(), Some(&6));
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut buf = RecentBuffer::new(0);
        buf.push("a");
        buf.push("b");
        assert_eq!(buf.capacity(), 1);
        assert_eq!(buf.iter().collect::<Vec<_>>(), vec![&"b"]);
    }
}
