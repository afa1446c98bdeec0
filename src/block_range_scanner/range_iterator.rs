use std::ops::RangeInclusive;

use alloy::primitives::BlockNumber;

/// Splits `[start, end]` into consecutive sub-ranges `[cursor, min(cursor + span, end)]`.
///
/// `span` is the distance between the first and last block of a full sub-range, so a span of
/// 999 yields 1000 blocks per query.
#[derive(Debug, Clone)]
pub struct RangeIterator {
    cursor: BlockNumber,
    end: BlockNumber,
    span: u64,
    exhausted: bool,
    batch_count: u64,
}

impl RangeIterator {
    /// Creates an iterator from `start` toward `end`, inclusive. Empty when `start > end`.
    #[must_use]
    pub const fn forward(start: BlockNumber, end: BlockNumber, span: u64) -> Self {
        Self { cursor: start, end, span, exhausted: start > end, batch_count: 0 }
    }

    /// Number of sub-ranges yielded so far.
    #[must_use]
    pub fn batch_count(&self) -> u64 {
        self.batch_count
    }

    /// Number of sub-ranges `[start, end]` splits into.
    #[must_use]
    pub fn total_batches(start: BlockNumber, end: BlockNumber, span: u64) -> u64 {
        if start > end { 0 } else { (end - start) / span.saturating_add(1) + 1 }
    }
}

impl Iterator for RangeIterator {
    type Item = RangeInclusive<BlockNumber>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }

        let batch_start = self.cursor;
        let batch_end = batch_start.saturating_add(self.span).min(self.end);
        self.batch_count += 1;

        if batch_end >= self.end {
            self.exhausted = true;
        } else {
            self.cursor = batch_end + 1;
        }

        if self.batch_count % 10 == 0 {
            trace!(batch_count = self.batch_count, "Yielded batches");
        }

        Some(batch_start..=batch_end)
    }
}
