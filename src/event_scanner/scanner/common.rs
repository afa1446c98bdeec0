use std::ops::RangeInclusive;

use alloy::rpc::types::{Filter, Log};
use futures::{StreamExt, stream};
use tokio_util::sync::CancellationToken;

use crate::{
    EventFilter, Notification, OutputSink, ScannerError,
    event_scanner::{EventRecord, record::decode_log},
    ledger::LedgerClient,
};

/// Records decoded from one batch of logs.
#[derive(Debug, Default)]
pub(crate) struct DecodedBatch {
    pub records: Vec<EventRecord>,
    pub skipped: usize,
    pub cancelled: bool,
}

/// Issues one log query. `range` is the block interval the query covers, used for reporting.
pub(crate) async fn fetch_logs<C: LedgerClient>(
    client: &C,
    event_filter: &EventFilter,
    log_filter: &Filter,
    range: RangeInclusive<u64>,
) -> Result<Vec<Log>, ScannerError> {
    match client.get_logs(log_filter).await {
        Ok(logs) => {
            if !logs.is_empty() {
                info!(
                    filter = %event_filter,
                    log_count = logs.len(),
                    block_range = ?range,
                    "found logs for event in block range"
                );
            }
            Ok(logs)
        }
        Err(e) => {
            error!(
                filter = %event_filter,
                error = %e,
                block_range = ?range,
                "failed to get logs for block range"
            );
            Err(ScannerError::Fetch {
                from_block: *range.start(),
                to_block: *range.end(),
                source: e,
            })
        }
    }
}

/// Decodes `logs` with at most `width` decodes in flight.
///
/// No new decode starts once `cancel` fires, and results completing after that are dropped.
/// Records come back in completion order.
pub(crate) async fn decode_concurrently<C: LedgerClient>(
    client: &C,
    event_filter: &EventFilter,
    logs: Vec<Log>,
    width: usize,
    sink: &OutputSink,
    cancel: &CancellationToken,
) -> DecodedBatch {
    let event = event_filter.event();
    let mut batch = DecodedBatch::default();

    let mut pending = stream::iter(logs)
        .map(|log| async move {
            if cancel.is_cancelled() {
                return None;
            }
            Some(decode_log(client, event, &log).await)
        })
        .buffer_unordered(width);

    while let Some(result) = pending.next().await {
        if cancel.is_cancelled() {
            break;
        }
        match result {
            Some(Ok(record)) => batch.records.push(record),
            Some(Err(e)) => {
                batch.skipped += 1;
                sink.notify(Notification::RecordSkipped(e));
            }
            None => {}
        }
    }

    batch.cancelled = cancel.is_cancelled();
    batch
}
