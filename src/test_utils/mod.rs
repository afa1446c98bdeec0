//! In-memory fixtures for exercising the scanners without a node.

mod macros;
mod mock_ledger;

pub use mock_ledger::MockLedger;

use alloy::{
    dyn_abi::DynSolValue,
    primitives::{Address, B256, Bytes, U256},
};
use serde_json::{Value, json};

/// Canonical `Transfer(address,address,uint256)` topic.
pub const TRANSFER_TOPIC: B256 =
    alloy::primitives::b256!("ddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef");

/// A trimmed ERC-20 interface: `transfer`, `Transfer` and `Approval`.
#[must_use]
pub fn erc20_interface() -> Value {
    json!([
        {
            "type": "function",
            "name": "transfer",
            "stateMutability": "nonpayable",
            "inputs": [
                {"name": "to", "type": "address"},
                {"name": "value", "type": "uint256"}
            ],
            "outputs": [{"name": "", "type": "bool"}]
        },
        {
            "type": "event",
            "name": "Transfer",
            "anonymous": false,
            "inputs": [
                {"name": "from", "type": "address", "indexed": true},
                {"name": "to", "type": "address", "indexed": true},
                {"name": "value", "type": "uint256", "indexed": false}
            ]
        },
        {
            "type": "event",
            "name": "Approval",
            "anonymous": false,
            "inputs": [
                {"name": "owner", "type": "address", "indexed": true},
                {"name": "spender", "type": "address", "indexed": true},
                {"name": "value", "type": "uint256", "indexed": false}
            ]
        }
    ])
}

/// Topics and data of a `Transfer` log.
#[must_use]
pub fn transfer_log_parts(from: Address, to: Address, value: u64) -> (Vec<B256>, Bytes) {
    let topics = vec![TRANSFER_TOPIC, from.into_word(), to.into_word()];
    let data =
        DynSolValue::Tuple(vec![DynSolValue::Uint(U256::from(value), 256)]).abi_encode_params();
    (topics, data.into())
}
