use std::{fmt, ops::RangeInclusive};

use alloy::primitives::{Address, B256};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::{ScannerError, event_scanner::EventRecord};

/// Counters kept while a historical scan runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanProgress {
    /// First block not yet covered by a finished sub-range.
    pub next_block: u64,
    pub batches_done: u64,
    pub batches_failed: u64,
    pub records: usize,
    pub skipped: usize,
}

/// Diagnostic emitted on the [`OutputSink`] while a scanner works.
///
/// Meant for display; the [`fmt::Display`] rendering is the human-readable line.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    ScanStarted { address: Address, signature: String, topic: B256 },
    RangeResolved { from_block: u64, to_block: u64, batches: u64 },
    BatchStarted(RangeInclusive<u64>),
    LogsFetched { range: RangeInclusive<u64>, count: usize },
    /// A sub-range or poll query failed and was skipped.
    BatchFailed(ScannerError),
    /// A single log could not be decoded and was skipped.
    RecordSkipped(ScannerError),
    Progress { processed: usize },
    PollStarted { from_block: u64 },
    RecordDecoded(Box<EventRecord>),
    Cancelled,
    ScanFinished(ScanProgress),
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::ScanStarted { address, signature, topic } => {
                write!(f, "scanning {signature} on {address} (topic {topic})")
            }
            Notification::RangeResolved { from_block, to_block, batches } => {
                write!(f, "block range {from_block}..={to_block} in {batches} queries")
            }
            Notification::BatchStarted(range) => {
                write!(f, "querying blocks {}..={}", range.start(), range.end())
            }
            Notification::LogsFetched { range, count } => {
                write!(f, "found {count} logs in blocks {}..={}", range.start(), range.end())
            }
            Notification::BatchFailed(err) => write!(f, "query skipped: {err}"),
            Notification::RecordSkipped(err) => write!(f, "event skipped: {err}"),
            Notification::Progress { processed } => write!(f, "processed {processed} events"),
            Notification::PollStarted { from_block } => {
                write!(f, "polling for new events from block {from_block}")
            }
            Notification::RecordDecoded(record) => write!(
                f,
                "block {} tx {} at {}: {}",
                record.block_number, record.tx_hash, record.timestamp, record.args_text
            ),
            Notification::Cancelled => f.write_str("scan cancelled"),
            Notification::ScanFinished(progress) => write!(
                f,
                "scan finished: {} events, {} skipped, {} of {} queries failed",
                progress.records,
                progress.skipped,
                progress.batches_failed,
                progress.batches_done + progress.batches_failed
            ),
        }
    }
}

/// Write end of the scanners' diagnostic channel.
///
/// Never blocks and never fails: when the receiving side is gone notifications are dropped.
#[derive(Debug, Clone, Default)]
pub struct OutputSink {
    sender: Option<mpsc::UnboundedSender<Notification>>,
}

impl OutputSink {
    /// A connected sink and its receiver.
    #[must_use]
    pub fn channel() -> (Self, OutputReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender: Some(sender) }, OutputReceiver { receiver })
    }

    /// A sink that only logs.
    #[must_use]
    pub fn discard() -> Self {
        Self::default()
    }

    pub(crate) fn notify(&self, notification: Notification) {
        match &notification {
            Notification::BatchFailed(err) | Notification::RecordSkipped(err) => {
                warn!(error = %err, "Skipping failed unit of work");
            }
            other => debug!(notification = %other, "Scanner notification"),
        }

        if let Some(sender) = &self.sender {
            if sender.send(notification).is_err() {
                trace!("Output receiver dropped, discarding notification");
            }
        }
    }
}

/// Read end of an [`OutputSink`].
#[derive(Debug)]
pub struct OutputReceiver {
    receiver: mpsc::UnboundedReceiver<Notification>,
}

impl OutputReceiver {
    /// Everything emitted so far, without waiting.
    pub fn drain(&mut self) -> Vec<Notification> {
        let mut drained = Vec::new();
        while let Ok(notification) = self.receiver.try_recv() {
            drained.push(notification);
        }
        drained
    }

    /// [`Self::drain`], rendered as text lines.
    pub fn drain_lines(&mut self) -> Vec<String> {
        self.drain().iter().map(ToString::to_string).collect()
    }

    #[must_use]
    pub fn into_stream(self) -> UnboundedReceiverStream<Notification> {
        UnboundedReceiverStream::new(self.receiver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_returns_notifications_in_order() {
        let (sink, mut receiver) = OutputSink::channel();

        sink.notify(Notification::BatchStarted(1..=1000));
        sink.notify(Notification::Progress { processed: 3 });

        assert_eq!(
            receiver.drain(),
            vec![Notification::BatchStarted(1..=1000), Notification::Progress { processed: 3 }]
        );
        assert!(receiver.drain().is_empty());
    }

    #[test]
    fn dropped_receiver_does_not_fail_the_sender() {
        let (sink, receiver) = OutputSink::channel();
        drop(receiver);

        sink.notify(Notification::Cancelled);
        OutputSink::discard().notify(Notification::Cancelled);
    }

    #[test]
    fn lines_are_human_readable() {
        let (sink, mut receiver) = OutputSink::channel();

        sink.notify(Notification::LogsFetched { range: 1001..=2000, count: 7 });
        sink.notify(Notification::Progress { processed: 100 });

        assert_eq!(
            receiver.drain_lines(),
            vec!["found 7 logs in blocks 1001..=2000", "processed 100 events"]
        );
    }
}
