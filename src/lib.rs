//! Event Range Scanner collects the events one contract emitted, either over a closed block or
//! time range or by following the chain head.
//!
//! The entry point is [`EventScanner`], built via [`EventScannerBuilder`] in [`Historic`] or
//! [`Live`] mode and bound to one [`EventFilter`] (a contract address plus one event resolved
//! from its JSON interface). [`scan_historical`] and [`scan_live`] wrap the builder for one-off
//! calls.
//!
//! # Records
//!
//! Every matching log becomes an [`EventRecord`]: transaction hash, block number and timestamp,
//! transaction sender and recipient, and the decoded arguments rendered as text. That text can be
//! parsed back with [`attribute_text::parse_args_text`] and [`export::ExportTable`] flattens a
//! record set into CSV columns.
//!
//! # Failures
//!
//! Resolving the event, reaching the node and resolving the range are the only steps that fail a
//! scan. A failed log query skips its sub-range and a log that cannot be decoded is skipped; both
//! are reported as [`Notification`]s on the [`OutputSink`] and the scan continues.
//!
//! # Cancellation
//!
//! Scanners take a [`CancellationToken`][cancel]. It is checked before each sub-range, before
//! each decode starts, while decode results drain and around every live poll. A cancelled scan
//! returns the records decoded until then.
//!
//! # Ledger access
//!
//! Scanners talk to the node through [`LedgerClient`]. The [`robust_provider`] module provides
//! [`robust_provider::RobustProvider`], an implementation that retries with backoff, enforces a
//! per-call timeout and can fail over across several RPC endpoints.
//!
//! [cancel]: tokio_util::sync::CancellationToken

#[macro_use]
mod logging;

pub mod attribute_text;
pub mod block_range_scanner;
pub mod config;
pub mod export;
pub mod ledger;
pub mod robust_provider;
pub mod signature;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

mod error;
mod event_scanner;
mod types;

pub use error::ScannerError;
pub use ledger::LedgerClient;
pub use types::{Notification, OutputReceiver, OutputSink, ScanProgress};

pub use event_scanner::{
    DEFAULT_BATCH_SPAN, DEFAULT_MAX_CONCURRENT_DECODES, DEFAULT_POLL_INTERVAL, EventFilter,
    EventRecord, EventScanner, EventScannerBuilder, Historic, Live, PollerState, ScanRange,
    SharedResults, TailMode, Unspecified, decode_log, render_args, scan_historical, scan_live,
};
