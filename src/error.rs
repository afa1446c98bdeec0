use std::mem::discriminant;

use alloy::{eips::BlockNumberOrTag, primitives::TxHash};
use thiserror::Error;

use crate::{robust_provider::Error as LedgerError, signature::SignatureError};

/// Errors produced while preparing or running a scan.
///
/// Only [`ScannerError::Connection`], [`ScannerError::Signature`], [`ScannerError::BlockLookup`]
/// and the configuration variants are ever returned to the caller. [`ScannerError::Fetch`] and
/// [`ScannerError::Decode`] describe a single skipped unit of work: the scanner reports them on
/// the output sink and keeps going.
#[derive(Error, Debug, Clone)]
pub enum ScannerError {
    /// The ledger node could not be reached.
    #[error("cannot connect to ledger node: {0}")]
    Connection(LedgerError),

    /// The event could not be resolved from the interface description.
    #[error(transparent)]
    Signature(#[from] SignatureError),

    /// A block needed to resolve the scan range could not be read.
    #[error("block lookup for {block} failed: {source}")]
    BlockLookup { block: BlockNumberOrTag, source: LedgerError },

    /// Fetching the logs of one sub-range failed.
    #[error("log query for blocks {from_block}..={to_block} failed: {source}")]
    Fetch { from_block: u64, to_block: u64, source: LedgerError },

    /// One log could not be turned into an event record.
    #[error("decoding log of transaction {tx_hash:?} failed: {reason}")]
    Decode { tx_hash: Option<TxHash>, reason: String },

    /// The resolved range is empty or starts at block zero.
    #[error("invalid scan range: start block {start} end block {end}")]
    InvalidRange { start: u64, end: u64 },

    /// The configured number of concurrent decodes is invalid (must be greater than zero).
    #[error("Max concurrent decodes must be greater than 0")]
    InvalidMaxConcurrentDecodes,
}

impl ScannerError {
    pub(crate) fn decode(tx_hash: Option<TxHash>, reason: impl ToString) -> Self {
        ScannerError::Decode { tx_hash, reason: reason.to_string() }
    }

    /// Whether the scan can continue after this error.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ScannerError::Fetch { .. } | ScannerError::Decode { .. })
    }
}

// Variant-only comparison, used by tests asserting on the kind of failure.
impl PartialEq for ScannerError {
    fn eq(&self, other: &Self) -> bool {
        discriminant(self) == discriminant(other)
    }
}
