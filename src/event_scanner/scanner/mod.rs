use std::time::Duration;

use alloy::{eips::BlockNumberOrTag, primitives::Address};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::{
    EventFilter, OutputSink, ScannerError, event_scanner::EventRecord, ledger::LedgerClient,
};

mod common;
mod historic;
mod live;

pub use historic::ScanRange;
pub use live::{PollerState, TailMode};

/// Default distance between the first and last block of one log query (1000 blocks per query).
pub const DEFAULT_BATCH_SPAN: u64 = 999;

/// Default number of logs of one sub-range decoded concurrently.
pub const DEFAULT_MAX_CONCURRENT_DECODES: usize = 5;

/// Default pause between two live polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Default)]
pub struct Unspecified;

pub struct Historic {
    pub(crate) range: ScanRange,
    pub(crate) batch_span: u64,
    pub(crate) max_concurrent_decodes: usize,
}

pub struct Live {
    pub(crate) poll_interval: Duration,
    pub(crate) tail_mode: TailMode,
    /// Highest block covered by the previous poll, used by [`TailMode::Contiguous`].
    pub(crate) last_polled: Option<u64>,
}

impl Default for Historic {
    fn default() -> Self {
        Self {
            range: ScanRange::default(),
            batch_span: DEFAULT_BATCH_SPAN,
            max_concurrent_decodes: DEFAULT_MAX_CONCURRENT_DECODES,
        }
    }
}

impl Default for Live {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            tail_mode: TailMode::default(),
            last_polled: None,
        }
    }
}

/// A scanner bound to one ledger client and one [`EventFilter`].
pub struct EventScanner<M, C> {
    config: M,
    client: C,
    filter: EventFilter,
}

#[derive(Default)]
pub struct EventScannerBuilder<M> {
    pub(crate) config: M,
}

impl EventScannerBuilder<Unspecified> {
    /// Collects the events of a closed block or time range.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use alloy::{network::Ethereum, primitives::address};
    /// # use event_range_scanner::{
    /// #     EventFilter, EventScannerBuilder, OutputSink, ScanRange,
    /// #     robust_provider::RobustProviderBuilder,
    /// # };
    /// # use tokio_util::sync::CancellationToken;
    /// #
    /// # async fn example(interface: serde_json::Value) -> Result<(), Box<dyn std::error::Error>> {
    /// let token = address!("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");
    /// let filter = EventFilter::resolve(token, &interface, "Transfer")?;
    ///
    /// let provider =
    ///     RobustProviderBuilder::<Ethereum, _>::new("https://eth.llamarpc.com").build().await?;
    /// let scanner = EventScannerBuilder::historic()
    ///     .range(ScanRange::blocks(19_000_000, Some(19_010_000)))
    ///     .connect(provider, filter)
    ///     .await?;
    ///
    /// let (sink, mut output) = OutputSink::channel();
    /// let records = scanner.run(&sink, &CancellationToken::new()).await?;
    ///
    /// for line in output.drain_lines() {
    ///     println!("{line}");
    /// }
    /// println!("collected {} transfers", records.len());
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # How it works
    ///
    /// * Time bounds are first mapped to block numbers by binary search over block timestamps.
    /// * The block range is walked oldest to newest in sub-ranges no wider than
    ///   [`batch_span`][batch_span], one log query each.
    /// * Logs of a sub-range are decoded concurrently, at most
    ///   [`max_concurrent_decodes`][decodes] at a time, before the next sub-range starts.
    /// * A failed query or a log that fails to decode is reported on the sink and skipped.
    ///
    /// [batch_span]: EventScannerBuilder::batch_span
    /// [decodes]: EventScannerBuilder::max_concurrent_decodes
    #[must_use]
    pub fn historic() -> EventScannerBuilder<Historic> {
        EventScannerBuilder::default()
    }

    /// Follows the chain head, reporting new events as they appear.
    ///
    /// Each poll reads the head, queries `[from, latest]` and decodes the results one by one,
    /// then sleeps for [`poll_interval`][interval]. See [`TailMode`] for how `from` is chosen.
    ///
    /// [interval]: EventScannerBuilder::poll_interval
    #[must_use]
    pub fn live() -> EventScannerBuilder<Live> {
        EventScannerBuilder::default()
    }
}

impl<M> EventScannerBuilder<M> {
    /// Checks that the node answers and binds the scanner to `client`.
    async fn build<C: LedgerClient>(
        self,
        client: C,
        filter: EventFilter,
    ) -> Result<EventScanner<M, C>, ScannerError> {
        let head = client.get_block(BlockNumberOrTag::Latest).await.map_err(|e| {
            error!(error = %e, "Ledger node unreachable");
            ScannerError::Connection(e)
        })?;

        info!(filter = %filter, head = head.number, "Connected scanner");

        Ok(EventScanner { config: self.config, client, filter })
    }
}

impl<M, C> EventScanner<M, C> {
    #[must_use]
    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }
}

/// Collects every `event_name` event emitted by `address` within `range`.
///
/// Uses the default batch span and decode width. Progress and skipped work are reported on
/// `sink`; cancelling `cancel` stops the scan at its next checkpoint and returns what was decoded
/// before.
///
/// # Errors
///
/// * [`ScannerError::Signature`] if the event cannot be resolved from `interface`.
/// * [`ScannerError::Connection`] if `client` does not answer.
/// * [`ScannerError::BlockLookup`] if a time bound cannot be resolved.
/// * [`ScannerError::InvalidRange`] if the resolved range is empty.
pub async fn scan_historical<C: LedgerClient>(
    address: Address,
    interface: &Value,
    event_name: &str,
    range: ScanRange,
    client: C,
    sink: &OutputSink,
    cancel: &CancellationToken,
) -> Result<Vec<EventRecord>, ScannerError> {
    let filter = EventFilter::resolve(address, interface, event_name)?;
    let scanner = EventScannerBuilder::historic().range(range).connect(client, filter).await?;
    scanner.run(sink, cancel).await
}

/// Runs a single live poll for `event_name` events emitted by `address`.
///
/// # Errors
///
/// * [`ScannerError::Signature`] if the event cannot be resolved from `interface`.
/// * [`ScannerError::Connection`] if `client` does not answer.
pub async fn scan_live<C: LedgerClient>(
    address: Address,
    interface: &Value,
    event_name: &str,
    client: C,
    sink: &OutputSink,
    cancel: &CancellationToken,
) -> Result<Vec<EventRecord>, ScannerError> {
    let filter = EventFilter::resolve(address, interface, event_name)?;
    let mut scanner = EventScannerBuilder::live().connect(client, filter).await?;
    Ok(scanner.poll_once(sink, cancel).await)
}
