use alloy::{eips::BlockNumberOrTag, rpc::types::Filter};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::common::{decode_concurrently, fetch_logs};
use crate::{
    EventFilter, EventScannerBuilder, Notification, OutputSink, ScanProgress, ScannerError,
    SharedResults,
    block_range_scanner::{RangeIterator, locate_block},
    event_scanner::{
        EventRecord,
        scanner::{EventScanner, Historic},
    },
    ledger::LedgerClient,
};

/// Bounds of a historical scan.
///
/// An absent `end` means the chain head in block mode and the current time in time mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScanRange {
    Blocks { start: u64, end: Option<u64> },
    Time { start: DateTime<Utc>, end: Option<DateTime<Utc>> },
}

impl ScanRange {
    #[must_use]
    pub fn blocks(start: u64, end: Option<u64>) -> Self {
        ScanRange::Blocks { start, end }
    }

    #[must_use]
    pub fn time(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Self {
        ScanRange::Time { start, end }
    }
}

impl Default for ScanRange {
    fn default() -> Self {
        ScanRange::Blocks { start: 1, end: None }
    }
}

impl EventScannerBuilder<Historic> {
    #[must_use]
    pub fn range(mut self, range: ScanRange) -> Self {
        self.config.range = range;
        self
    }

    /// Sets the distance between the first and last block of one log query.
    ///
    /// Scanning blocks 1000–1099 with `batch_span(29)` issues four queries:
    /// 1000–1029, 1030–1059, 1060–1089 and 1090–1099. A span of 0 queries one block at a time.
    ///
    /// Defaults to [`DEFAULT_BATCH_SPAN`][default].
    ///
    /// [default]: crate::DEFAULT_BATCH_SPAN
    #[must_use]
    pub fn batch_span(mut self, batch_span: u64) -> Self {
        self.config.batch_span = batch_span;
        self
    }

    /// Sets how many logs of one sub-range are decoded concurrently. Must be greater than 0.
    ///
    /// Every decode reads one transaction and one block, so this bounds the RPC load of the
    /// decode stage.
    ///
    /// Defaults to [`DEFAULT_MAX_CONCURRENT_DECODES`][default].
    ///
    /// [default]: crate::DEFAULT_MAX_CONCURRENT_DECODES
    #[must_use]
    pub fn max_concurrent_decodes(mut self, max_concurrent_decodes: usize) -> Self {
        self.config.max_concurrent_decodes = max_concurrent_decodes;
        self
    }

    /// Binds the scanner to `client`.
    ///
    /// # Errors
    ///
    /// * [`ScannerError::InvalidMaxConcurrentDecodes`] if the decode width is zero.
    /// * [`ScannerError::Connection`] if `client` cannot read the chain head.
    pub async fn connect<C: LedgerClient>(
        self,
        client: C,
        filter: EventFilter,
    ) -> Result<EventScanner<Historic, C>, ScannerError> {
        if self.config.max_concurrent_decodes == 0 {
            return Err(ScannerError::InvalidMaxConcurrentDecodes);
        }
        self.build(client, filter).await
    }
}

impl<C: LedgerClient> EventScanner<Historic, C> {
    /// Maps the configured range to inclusive block numbers.
    ///
    /// # Errors
    ///
    /// * [`ScannerError::BlockLookup`] if the head or a time bound cannot be read.
    /// * [`ScannerError::InvalidRange`] if the range is empty or starts at block 0.
    pub async fn resolve_range(&self) -> Result<(u64, u64), ScannerError> {
        let (start, end) = match self.config.range {
            ScanRange::Blocks { start, end } => {
                let end = match end {
                    Some(end) => end,
                    None => self.head().await?,
                };
                (start, end)
            }
            ScanRange::Time { start, end } => {
                let first = locate_block(&self.client, start).await?.max(1);
                let last = match end {
                    Some(end) => locate_block(&self.client, end).await?,
                    None => self.head().await?,
                };
                (first, last)
            }
        };

        if start == 0 || start > end {
            return Err(ScannerError::InvalidRange { start, end });
        }

        debug!(range = ?self.config.range, start, end, "Resolved scan range");
        Ok((start, end))
    }

    async fn head(&self) -> Result<u64, ScannerError> {
        let block = BlockNumberOrTag::Latest;
        self.client
            .get_block(block)
            .await
            .map(|head| head.number)
            .map_err(|source| ScannerError::BlockLookup { block, source })
    }

    /// Scans the configured range and returns the decoded records.
    ///
    /// Records of one sub-range are in decode completion order; sub-ranges are visited oldest
    /// first. Query and decode failures are reported on `sink` and skipped. When `cancel` fires,
    /// the records decoded until then are returned.
    ///
    /// # Errors
    ///
    /// Only range resolution fails the scan, see [`Self::resolve_range`].
    pub async fn run(
        &self,
        sink: &OutputSink,
        cancel: &CancellationToken,
    ) -> Result<Vec<EventRecord>, ScannerError> {
        let mut records = Vec::new();
        self.scan(sink, cancel, |batch| records.extend(batch)).await?;
        Ok(records)
    }

    /// Runs the scan on a new task, appending each sub-range's records to `results`.
    ///
    /// The task yields the number of records collected.
    pub fn spawn(
        self,
        sink: OutputSink,
        cancel: CancellationToken,
        results: SharedResults,
    ) -> JoinHandle<Result<usize, ScannerError>>
    where
        C: 'static,
    {
        tokio::spawn(async move {
            let progress = self
                .scan(&sink, &cancel, |batch| {
                    results.extend(batch);
                })
                .await?;
            Ok(progress.records)
        })
    }

    async fn scan(
        &self,
        sink: &OutputSink,
        cancel: &CancellationToken,
        mut collect: impl FnMut(Vec<EventRecord>) + Send,
    ) -> Result<ScanProgress, ScannerError> {
        let signature = &self.filter.event().signature;
        sink.notify(Notification::ScanStarted {
            address: self.filter.address(),
            signature: signature.canonical(),
            topic: self.filter.event().topic,
        });

        let (start, end) = self.resolve_range().await?;
        let span = self.config.batch_span;
        sink.notify(Notification::RangeResolved {
            from_block: start,
            to_block: end,
            batches: RangeIterator::total_batches(start, end, span),
        });

        info!(
            filter = %self.filter,
            from_block = start,
            to_block = end,
            batch_span = span,
            "Starting historical scan"
        );

        let base_filter = Filter::from(&self.filter);
        let mut progress = ScanProgress { next_block: start, ..ScanProgress::default() };

        for range in RangeIterator::forward(start, end, span) {
            if cancel.is_cancelled() {
                break;
            }

            sink.notify(Notification::BatchStarted(range.clone()));
            let log_filter = base_filter.clone().from_block(*range.start()).to_block(*range.end());

            let fetched = fetch_logs(&self.client, &self.filter, &log_filter, range.clone()).await;
            let logs = match fetched {
                Ok(logs) => logs,
                Err(e) => {
                    progress.batches_failed += 1;
                    progress.next_block = range.end().saturating_add(1);
                    sink.notify(Notification::BatchFailed(e));
                    continue;
                }
            };
            sink.notify(Notification::LogsFetched { range: range.clone(), count: logs.len() });

            let batch = decode_concurrently(
                &self.client,
                &self.filter,
                logs,
                self.config.max_concurrent_decodes,
                sink,
                cancel,
            )
            .await;

            progress.records += batch.records.len();
            progress.skipped += batch.skipped;
            collect(batch.records);

            if batch.cancelled {
                break;
            }

            progress.batches_done += 1;
            progress.next_block = range.end().saturating_add(1);
            sink.notify(Notification::Progress { processed: progress.records });
        }

        if cancel.is_cancelled() {
            info!(next_block = progress.next_block, records = progress.records, "Scan cancelled");
            sink.notify(Notification::Cancelled);
        } else {
            info!(
                records = progress.records,
                skipped = progress.skipped,
                failed_batches = progress.batches_failed,
                "Historical scan finished"
            );
        }
        sink.notify(Notification::ScanFinished(progress));

        Ok(progress)
    }
}
