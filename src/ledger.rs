//! The ledger node contract the scanners depend on.

use std::sync::Arc;

use alloy::{
    consensus::{BlockHeader, Transaction},
    eips::BlockNumberOrTag,
    network::{BlockResponse, Network, TransactionResponse},
    primitives::{Address, TxHash},
    rpc::types::{Filter, Log},
};

use crate::robust_provider::{Error as LedgerError, RobustProvider};

/// The two block fields the scanners read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    pub number: u64,
    /// Seconds since the Unix epoch.
    pub timestamp: u64,
}

/// Sender and recipient of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionInfo {
    pub hash: TxHash,
    pub from: Address,
    /// `None` for contract creations.
    pub to: Option<Address>,
}

/// JSON-RPC operations consumed by the scanners.
///
/// Implementations own their retry and timeout policy; the scanners report each failure once and
/// move on. [`RobustProvider`] is the production implementation.
pub trait LedgerClient: Send + Sync {
    /// `eth_getBlockByNumber`, reduced to number and timestamp.
    fn get_block(
        &self,
        block: BlockNumberOrTag,
    ) -> impl Future<Output = Result<BlockInfo, LedgerError>> + Send;

    /// `eth_getLogs`.
    fn get_logs(&self, filter: &Filter)
    -> impl Future<Output = Result<Vec<Log>, LedgerError>> + Send;

    /// `eth_getTransactionByHash`, reduced to sender and recipient.
    fn get_transaction(
        &self,
        hash: TxHash,
    ) -> impl Future<Output = Result<TransactionInfo, LedgerError>> + Send;
}

impl<N: Network> LedgerClient for RobustProvider<N> {
    async fn get_block(&self, block: BlockNumberOrTag) -> Result<BlockInfo, LedgerError> {
        let block = self.get_block_by_number(block).await?;
        let header = block.header();
        Ok(BlockInfo { number: header.number(), timestamp: header.timestamp() })
    }

    async fn get_logs(&self, filter: &Filter) -> Result<Vec<Log>, LedgerError> {
        RobustProvider::get_logs(self, filter).await
    }

    async fn get_transaction(&self, hash: TxHash) -> Result<TransactionInfo, LedgerError> {
        let tx = self.get_transaction_by_hash(hash).await?;
        Ok(TransactionInfo {
            hash,
            from: TransactionResponse::from(&tx),
            to: Transaction::to(&tx),
        })
    }
}

impl<C: LedgerClient> LedgerClient for &C {
    async fn get_block(&self, block: BlockNumberOrTag) -> Result<BlockInfo, LedgerError> {
        (**self).get_block(block).await
    }

    async fn get_logs(&self, filter: &Filter) -> Result<Vec<Log>, LedgerError> {
        (**self).get_logs(filter).await
    }

    async fn get_transaction(&self, hash: TxHash) -> Result<TransactionInfo, LedgerError> {
        (**self).get_transaction(hash).await
    }
}

impl<C: LedgerClient> LedgerClient for Arc<C> {
    async fn get_block(&self, block: BlockNumberOrTag) -> Result<BlockInfo, LedgerError> {
        (**self).get_block(block).await
    }

    async fn get_logs(&self, filter: &Filter) -> Result<Vec<Log>, LedgerError> {
        (**self).get_logs(filter).await
    }

    async fn get_transaction(&self, hash: TxHash) -> Result<TransactionInfo, LedgerError> {
        (**self).get_transaction(hash).await
    }
}
