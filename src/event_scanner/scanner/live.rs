use std::time::Duration;

use alloy::{eips::BlockNumberOrTag, rpc::types::Filter};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::common::fetch_logs;
use crate::{
    EventFilter, EventScannerBuilder, Notification, OutputSink, ScannerError, SharedResults,
    event_scanner::{
        EventRecord,
        record::decode_log,
        scanner::{EventScanner, Live},
    },
    ledger::LedgerClient,
};

/// Where each live poll starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TailMode {
    /// Every poll starts at the head read at the start of that poll. Blocks produced while the
    /// poller sleeps are never queried.
    #[default]
    FromHead,
    /// Every poll starts right after the highest block covered by the previous one, so no block
    /// is skipped. The first poll starts at the head.
    Contiguous,
}

/// Lifecycle of [`EventScanner::<Live, _>::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Idle,
    Polling,
    Stopped,
}

impl EventScannerBuilder<Live> {
    /// Pause between the end of one poll and the start of the next.
    ///
    /// Defaults to [`DEFAULT_POLL_INTERVAL`][default].
    ///
    /// [default]: crate::DEFAULT_POLL_INTERVAL
    #[must_use]
    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.config.poll_interval = poll_interval;
        self
    }

    #[must_use]
    pub fn tail_mode(mut self, tail_mode: TailMode) -> Self {
        self.config.tail_mode = tail_mode;
        self
    }

    /// Binds the scanner to `client`.
    ///
    /// # Errors
    ///
    /// [`ScannerError::Connection`] if `client` cannot read the chain head.
    pub async fn connect<C: LedgerClient>(
        self,
        client: C,
        filter: EventFilter,
    ) -> Result<EventScanner<Live, C>, ScannerError> {
        self.build(client, filter).await
    }
}

impl<C: LedgerClient> EventScanner<Live, C> {
    /// Runs one poll: reads the head, queries `[from, latest]` and decodes the matches in log
    /// order, reporting each record on `sink`.
    ///
    /// A failed head read or query is reported and yields no records.
    pub async fn poll_once(
        &mut self,
        sink: &OutputSink,
        cancel: &CancellationToken,
    ) -> Vec<EventRecord> {
        if cancel.is_cancelled() {
            return Vec::new();
        }

        let head = match self.client.get_block(BlockNumberOrTag::Latest).await {
            Ok(head) => head.number,
            Err(source) => {
                let block = BlockNumberOrTag::Latest;
                sink.notify(Notification::BatchFailed(ScannerError::BlockLookup { block, source }));
                return Vec::new();
            }
        };

        let from_block = match (self.config.tail_mode, self.config.last_polled) {
            (TailMode::Contiguous, Some(last)) => last.saturating_add(1),
            _ => head,
        };
        if from_block > head {
            trace!(from_block, head, "No new blocks since last poll");
            return Vec::new();
        }

        if cancel.is_cancelled() {
            return Vec::new();
        }
        sink.notify(Notification::PollStarted { from_block });

        let log_filter =
            Filter::from(&self.filter).from_block(from_block).to_block(BlockNumberOrTag::Latest);
        let fetched = fetch_logs(&self.client, &self.filter, &log_filter, from_block..=head).await;
        let logs = match fetched {
            Ok(logs) => logs,
            Err(e) => {
                sink.notify(Notification::BatchFailed(e));
                return Vec::new();
            }
        };

        let covered = logs.iter().filter_map(|log| log.block_number).fold(head, u64::max);

        let mut records = Vec::new();
        for log in &logs {
            if cancel.is_cancelled() {
                break;
            }
            match decode_log(&self.client, self.filter.event(), log).await {
                Ok(record) => {
                    sink.notify(Notification::RecordDecoded(Box::new(record.clone())));
                    records.push(record);
                }
                Err(e) => sink.notify(Notification::RecordSkipped(e)),
            }
        }

        if !cancel.is_cancelled() {
            self.config.last_polled = Some(covered);
        }

        debug!(from_block, head, records = records.len(), "Live poll finished");
        records
    }

    /// Polls until `cancel` fires, appending records to `results`. Returns the number of
    /// records collected.
    pub async fn run(
        &mut self,
        sink: &OutputSink,
        cancel: &CancellationToken,
        results: &SharedResults,
    ) -> usize {
        let mut state = PollerState::Idle;
        let mut collected = 0;

        info!(
            filter = %self.filter,
            poll_interval = ?self.config.poll_interval,
            tail_mode = ?self.config.tail_mode,
            "Starting live poller"
        );

        loop {
            state = match state {
                PollerState::Idle if cancel.is_cancelled() => PollerState::Stopped,
                PollerState::Idle => PollerState::Polling,
                PollerState::Polling => {
                    let records = self.poll_once(sink, cancel).await;
                    collected += records.len();
                    results.extend(records);

                    tokio::select! {
                        () = cancel.cancelled() => PollerState::Stopped,
                        () = tokio::time::sleep(self.config.poll_interval) => PollerState::Idle,
                    }
                }
                PollerState::Stopped => break,
            };
            trace!(state = ?state, "Live poller transition");
        }

        info!(records = collected, "Live poller stopped");
        sink.notify(Notification::Cancelled);
        collected
    }

    /// Runs [`Self::run`] on a new task.
    pub fn spawn(
        mut self,
        sink: OutputSink,
        cancel: CancellationToken,
        results: SharedResults,
    ) -> JoinHandle<usize>
    where
        C: 'static,
    {
        tokio::spawn(async move { self.run(&sink, &cancel, &results).await })
    }
}
