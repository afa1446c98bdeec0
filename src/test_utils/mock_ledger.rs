use std::{
    collections::{BTreeMap, HashMap, HashSet},
    ops::RangeInclusive,
    sync::{
        Mutex, MutexGuard, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use alloy::{
    eips::{BlockId, BlockNumberOrTag},
    primitives::{Address, B256, Bytes, LogData, TxHash, keccak256},
    rpc::types::{Filter, Log},
};
use tokio_util::sync::CancellationToken;

use crate::{
    ledger::{BlockInfo, LedgerClient, TransactionInfo},
    robust_provider::Error as LedgerError,
    test_utils::transfer_log_parts,
};

/// A scripted ledger node.
///
/// Serves blocks, logs and transactions from memory, records every log query it receives and
/// can be told to fail specific reads.
#[derive(Default)]
pub struct MockLedger {
    state: Mutex<State>,
    block_reads: AtomicUsize,
    in_flight_transaction_reads: AtomicUsize,
    peak_transaction_reads: AtomicUsize,
}

#[derive(Default)]
struct State {
    blocks: BTreeMap<u64, u64>,
    logs: Vec<Log>,
    transactions: HashMap<TxHash, TransactionInfo>,
    tx_counter: u64,
    failing_blocks: HashSet<u64>,
    failing_log_ranges: Vec<RangeInclusive<u64>>,
    failing_transactions: HashSet<TxHash>,
    unreachable: bool,
    log_queries: Vec<RangeInclusive<u64>>,
    cancel_on_query: Option<(usize, CancellationToken)>,
    transaction_latency: Duration,
}

impl MockLedger {
    /// A ledger holding the given `(number, timestamp)` blocks.
    #[must_use]
    pub fn with_blocks(blocks: impl IntoIterator<Item = (u64, u64)>) -> Self {
        let ledger = Self::default();
        ledger.state().blocks.extend(blocks);
        ledger
    }

    /// Blocks `0..=head`, block `n` produced at `genesis + n * spacing`.
    #[must_use]
    pub fn with_chain(head: u64, genesis: u64, spacing: u64) -> Self {
        Self::with_blocks((0..=head).map(|n| (n, genesis + n * spacing)))
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn head(&self) -> u64 {
        self.state().blocks.last_key_value().map_or(0, |(n, _)| *n)
    }

    #[must_use]
    pub fn block_timestamp(&self, number: u64) -> Option<u64> {
        self.state().blocks.get(&number).copied()
    }

    /// Appends `count` blocks after the head, `spacing` seconds apart. Returns the new head.
    pub fn mine(&self, count: u64, spacing: u64) -> u64 {
        let mut state = self.state();
        let (mut head, mut ts) = state.blocks.last_key_value().map_or((0, 0), |(n, t)| (*n, *t));
        for _ in 0..count {
            head += 1;
            ts += spacing;
            state.blocks.insert(head, ts);
        }
        head
    }

    /// Records a log at `block` emitted by `address`, sent in a fresh transaction from `from`
    /// to `address`. Returns the transaction hash.
    pub fn emit(
        &self,
        block: u64,
        address: Address,
        topics: Vec<B256>,
        data: Bytes,
        from: Address,
    ) -> TxHash {
        let mut state = self.state();
        state.tx_counter += 1;
        let hash = keccak256(state.tx_counter.to_be_bytes());
        let log_index = state.logs.iter().filter(|log| log.block_number == Some(block)).count();

        state.logs.push(Log {
            inner: alloy::primitives::Log { address, data: LogData::new_unchecked(topics, data) },
            block_number: Some(block),
            transaction_hash: Some(hash),
            log_index: Some(log_index as u64),
            ..Default::default()
        });
        state.transactions.insert(hash, TransactionInfo { hash, from, to: Some(address) });
        hash
    }

    /// Records a `Transfer` log emitted by `token`.
    pub fn emit_transfer(
        &self,
        block: u64,
        token: Address,
        from: Address,
        to: Address,
        value: u64,
    ) -> TxHash {
        let (topics, data) = transfer_log_parts(from, to, value);
        self.emit(block, token, topics, data, from)
    }

    /// Every read fails as if the node were down.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state().unreachable = unreachable;
    }

    pub fn fail_block(&self, number: u64) {
        self.state().failing_blocks.insert(number);
    }

    /// Log queries overlapping `range` fail.
    pub fn fail_logs_in(&self, range: RangeInclusive<u64>) {
        self.state().failing_log_ranges.push(range);
    }

    pub fn fail_transaction(&self, hash: TxHash) {
        self.state().failing_transactions.insert(hash);
    }

    /// Cancels `token` while answering the `nth` log query (1-based). The query itself still
    /// succeeds.
    pub fn cancel_on_log_query(&self, nth: usize, token: CancellationToken) {
        self.state().cancel_on_query = Some((nth, token));
    }

    /// Delays every transaction read.
    pub fn set_transaction_latency(&self, latency: Duration) {
        self.state().transaction_latency = latency;
    }

    /// The `[from, to]` bounds of every log query, in the order received.
    #[must_use]
    pub fn log_queries(&self) -> Vec<RangeInclusive<u64>> {
        self.state().log_queries.clone()
    }

    #[must_use]
    pub fn block_reads(&self) -> usize {
        self.block_reads.load(Ordering::SeqCst)
    }

    /// Highest number of transaction reads observed in flight at once.
    #[must_use]
    pub fn peak_transaction_reads(&self) -> usize {
        self.peak_transaction_reads.load(Ordering::SeqCst)
    }
}

impl LedgerClient for MockLedger {
    async fn get_block(&self, block: BlockNumberOrTag) -> Result<BlockInfo, LedgerError> {
        self.block_reads.fetch_add(1, Ordering::SeqCst);
        let state = self.state();
        if state.unreachable {
            return Err(LedgerError::Timeout);
        }

        let entry = match block {
            BlockNumberOrTag::Number(number) => {
                if state.failing_blocks.contains(&number) {
                    return Err(LedgerError::Timeout);
                }
                state.blocks.get_key_value(&number)
            }
            BlockNumberOrTag::Earliest => state.blocks.first_key_value(),
            _ => state.blocks.last_key_value(),
        };

        entry
            .map(|(number, timestamp)| BlockInfo { number: *number, timestamp: *timestamp })
            .ok_or(LedgerError::BlockNotFound(BlockId::Number(block)))
    }

    async fn get_logs(&self, filter: &Filter) -> Result<Vec<Log>, LedgerError> {
        let mut state = self.state();
        if state.unreachable {
            return Err(LedgerError::Timeout);
        }

        let head = state.blocks.last_key_value().map_or(0, |(n, _)| *n);
        let from = filter.get_from_block().unwrap_or(0);
        let to = filter.get_to_block().unwrap_or(head);
        state.log_queries.push(from..=to);

        let query_count = state.log_queries.len();
        if let Some((nth, token)) = &state.cancel_on_query {
            if *nth == query_count {
                token.cancel();
            }
        }

        if state.failing_log_ranges.iter().any(|r| *r.start() <= to && from <= *r.end()) {
            return Err(LedgerError::Timeout);
        }

        Ok(state
            .logs
            .iter()
            .filter(|log| log.block_number.is_some_and(|n| (from..=to).contains(&n)))
            .filter(|log| filter.address.matches(&log.address()))
            .filter(|log| log.topics().first().is_some_and(|topic| filter.topics[0].matches(topic)))
            .cloned()
            .collect())
    }

    async fn get_transaction(&self, hash: TxHash) -> Result<TransactionInfo, LedgerError> {
        let in_flight = self.in_flight_transaction_reads.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_transaction_reads.fetch_max(in_flight, Ordering::SeqCst);

        let latency = self.state().transaction_latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let result = {
            let state = self.state();
            if state.unreachable || state.failing_transactions.contains(&hash) {
                Err(LedgerError::TransactionNotFound(hash))
            } else {
                state.transactions.get(&hash).copied().ok_or(LedgerError::TransactionNotFound(hash))
            }
        };

        self.in_flight_transaction_reads.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
