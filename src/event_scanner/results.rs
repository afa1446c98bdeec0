use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::event_scanner::EventRecord;

/// Records accumulated by a running scan, readable while it runs.
///
/// Cloning yields another handle to the same buffer.
#[derive(Debug, Clone, Default)]
pub struct SharedResults {
    inner: Arc<Mutex<Vec<EventRecord>>>,
}

impl SharedResults {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<EventRecord>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends `records` and returns the new total.
    pub fn extend(&self, records: impl IntoIterator<Item = EventRecord>) -> usize {
        let mut guard = self.lock();
        guard.extend(records);
        guard.len()
    }

    /// A copy of everything accumulated so far.
    #[must_use]
    pub fn snapshot(&self) -> Vec<EventRecord> {
        self.lock().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Removes and returns every record.
    pub fn take(&self) -> Vec<EventRecord> {
        std::mem::take(&mut *self.lock())
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{Address, TxHash};
    use chrono::DateTime;

    use super::*;

    fn record(block_number: u64) -> EventRecord {
        EventRecord {
            tx_hash: TxHash::with_last_byte(block_number as u8),
            block_number,
            timestamp: DateTime::UNIX_EPOCH,
            from: Address::ZERO,
            to: None,
            args_text: "EventArgs({})".into(),
        }
    }

    #[test]
    fn snapshot_is_a_detached_copy() {
        let results = SharedResults::new();
        results.extend([record(1), record(2)]);

        let snapshot = results.snapshot();
        results.extend([record(3)]);

        assert_eq!(snapshot.len(), 2);
        assert_eq!(results.len(), 3);
    }

    #[test]
    fn clones_share_the_buffer() {
        let writer = SharedResults::new();
        let reader = writer.clone();

        assert_eq!(writer.extend([record(7)]), 1);
        assert_eq!(reader.snapshot(), vec![record(7)]);

        assert_eq!(reader.take(), vec![record(7)]);
        assert!(writer.is_empty());
    }

    #[tokio::test]
    async fn concurrent_writers_and_readers() {
        let results = SharedResults::new();

        let writers: Vec<_> = (0..4_u64)
            .map(|w| {
                let results = results.clone();
                tokio::spawn(async move {
                    for i in 0..25 {
                        results.extend([record(w * 100 + i)]);
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();

        for writer in writers {
            let _ = results.snapshot();
            writer.await.expect("writer task panicked");
        }

        assert_eq!(results.len(), 100);
    }
}
