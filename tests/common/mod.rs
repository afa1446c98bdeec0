#![allow(dead_code)]

use alloy::primitives::{Address, address};
use event_range_scanner::{
    EventFilter,
    test_utils::{MockLedger, erc20_interface},
};

pub const TOKEN: Address = address!("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");
pub const ALICE: Address = address!("0x00000000000000000000000000000000000A11CE");
pub const BOB: Address = address!("0x0000000000000000000000000000000000000B0B");

/// Block `n` is produced at `GENESIS_TIME + BLOCK_TIME * n`.
pub const GENESIS_TIME: u64 = 1_700_000_000;
pub const BLOCK_TIME: u64 = 12;

pub fn transfer_filter() -> EventFilter {
    EventFilter::resolve(TOKEN, &erc20_interface(), "Transfer").expect("Transfer resolves")
}

/// A chain up to `head` holding one ALICE -> BOB transfer in each of `blocks`, worth the block
/// number.
pub fn chain_with_transfers(head: u64, blocks: &[u64]) -> MockLedger {
    let ledger = MockLedger::with_chain(head, GENESIS_TIME, BLOCK_TIME);
    for &block in blocks {
        ledger.emit_transfer(block, TOKEN, ALICE, BOB, block);
    }
    ledger
}

pub fn transfer_args_text(value: u64) -> String {
    format!(
        "EventArgs({{'from': '{}', 'to': '{}', 'value': {value}}})",
        ALICE.to_checksum(None),
        BOB.to_checksum(None)
    )
}
