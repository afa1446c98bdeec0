use alloy::{
    dyn_abi::{DecodedEvent, DynSolValue, EventExt},
    eips::BlockNumberOrTag,
    hex,
    json_abi::Event,
    primitives::{Address, TxHash},
    rpc::types::Log,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ScannerError, ledger::LedgerClient, signature::ResolvedEvent};

/// A decoded event occurrence plus its transaction and block context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub timestamp: DateTime<Utc>,
    /// Transaction sender.
    pub from: Address,
    /// Transaction recipient, `None` for contract creations.
    pub to: Option<Address>,
    /// Decoded arguments rendered as `EventArgs({'name': value, ...})`.
    pub args_text: String,
}

/// Turns one matching log into an [`EventRecord`].
///
/// Reads the emitting transaction for sender and recipient and the containing block for its
/// timestamp.
///
/// # Errors
///
/// [`ScannerError::Decode`] when the log lacks a transaction hash or block number, its payload
/// does not decode against `event`, or either context read fails.
pub async fn decode_log<C: LedgerClient>(
    client: &C,
    event: &ResolvedEvent,
    log: &Log,
) -> Result<EventRecord, ScannerError> {
    let tx_hash = log
        .transaction_hash
        .ok_or_else(|| ScannerError::decode(None, "log has no transaction hash"))?;
    let block_number = log
        .block_number
        .ok_or_else(|| ScannerError::decode(Some(tx_hash), "log has no block number"))?;

    let decoded = event
        .event
        .decode_log(log.data())
        .map_err(|e| ScannerError::decode(Some(tx_hash), e))?;
    let args_text = render_args(&event.event, &decoded);

    let tx = client
        .get_transaction(tx_hash)
        .await
        .map_err(|e| ScannerError::decode(Some(tx_hash), format!("transaction read: {e}")))?;
    let block = client
        .get_block(BlockNumberOrTag::Number(block_number))
        .await
        .map_err(|e| ScannerError::decode(Some(tx_hash), format!("block read: {e}")))?;

    let timestamp = i64::try_from(block.timestamp)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .ok_or_else(|| {
            let reason = format!("block timestamp {} out of range", block.timestamp);
            ScannerError::decode(Some(tx_hash), reason)
        })?;

    trace!(tx_hash = %tx_hash, block_number, "Decoded event log");

    Ok(EventRecord { tx_hash, block_number, timestamp, from: tx.from, to: tx.to, args_text })
}

/// Renders decoded arguments in declaration order. Unnamed parameters are called `arg<i>`.
#[must_use]
pub fn render_args(event: &Event, decoded: &DecodedEvent) -> String {
    let mut indexed = decoded.indexed.iter();
    let mut body = decoded.body.iter();

    let pairs: Vec<String> = event
        .inputs
        .iter()
        .enumerate()
        .filter_map(|(i, input)| {
            let value = if input.indexed { indexed.next() } else { body.next() }?;
            let name =
                if input.name.is_empty() { format!("arg{i}") } else { input.name.clone() };
            Some(format!("'{name}': {}", render_value(value)))
        })
        .collect();

    format!("EventArgs({{{}}})", pairs.join(", "))
}

// Sequences join without spaces so a top-level ", " only ever separates arguments.
fn render_value(value: &DynSolValue) -> String {
    match value {
        DynSolValue::Bool(true) => "True".to_owned(),
        DynSolValue::Bool(false) => "False".to_owned(),
        DynSolValue::Int(int, _) => int.to_string(),
        DynSolValue::Uint(uint, _) => uint.to_string(),
        DynSolValue::Address(address) => format!("'{}'", address.to_checksum(None)),
        DynSolValue::FixedBytes(word, size) => format!("'0x{}'", hex::encode(&word[..*size])),
        DynSolValue::Bytes(bytes) => format!("'0x{}'", hex::encode(bytes)),
        DynSolValue::String(s) => format!("'{}'", s.replace('\'', "\\'")),
        DynSolValue::Array(items) | DynSolValue::FixedArray(items) => {
            format!("[{}]", items.iter().map(render_value).collect::<Vec<_>>().join(","))
        }
        DynSolValue::Tuple(items) => {
            format!("({})", items.iter().map(render_value).collect::<Vec<_>>().join(","))
        }
        other => format!("'{other:?}'"),
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{B256, I256, LogData, U256, address};
    use serde_json::json;

    use super::*;
    use crate::test_utils::{MockLedger, erc20_interface};

    const TOKEN: Address = address!("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");
    const ALICE: Address = address!("0x00000000000000000000000000000000000A11CE");
    const BOB: Address = address!("0x0000000000000000000000000000000000000B0B");

    fn transfer() -> ResolvedEvent {
        ResolvedEvent::resolve(&erc20_interface(), "Transfer").expect("Transfer is declared")
    }

    fn only_log(ledger: &MockLedger) -> Log {
        let filter = alloy::rpc::types::Filter::new();
        let logs = futures::executor::block_on(ledger.get_logs(&filter)).expect("mock logs");
        logs.into_iter().next().expect("one log")
    }

    #[tokio::test]
    async fn transfer_log_becomes_record() -> anyhow::Result<()> {
        let ledger = MockLedger::with_chain(20, 1_700_000_000, 12);
        let tx_hash = ledger.emit_transfer(10, TOKEN, ALICE, BOB, 1_500);

        let record = decode_log(&ledger, &transfer(), &only_log(&ledger)).await?;

        assert_eq!(record.tx_hash, tx_hash);
        assert_eq!(record.block_number, 10);
        assert_eq!(record.timestamp.timestamp(), 1_700_000_120);
        assert_eq!(record.from, ALICE);
        assert_eq!(record.to, Some(TOKEN));
        assert_eq!(
            record.args_text,
            format!(
                "EventArgs({{'from': '{}', 'to': '{}', 'value': 1500}})",
                ALICE.to_checksum(None),
                BOB.to_checksum(None)
            )
        );

        Ok(())
    }

    #[tokio::test]
    async fn undecodable_payload_is_a_decode_error() {
        let ledger = MockLedger::with_chain(20, 0, 12);
        let topics = vec![transfer().topic, ALICE.into_word(), BOB.into_word()];
        let tx_hash = ledger.emit(5, TOKEN, topics, alloy::primitives::Bytes::new(), ALICE);

        let err = decode_log(&ledger, &transfer(), &only_log(&ledger)).await.unwrap_err();

        assert!(
            matches!(&err, ScannerError::Decode { tx_hash: Some(hash), .. } if *hash == tx_hash),
            "{err:?}"
        );
    }

    #[tokio::test]
    async fn failed_transaction_read_is_a_decode_error() {
        let ledger = MockLedger::with_chain(20, 0, 12);
        let tx_hash = ledger.emit_transfer(3, TOKEN, ALICE, BOB, 1);
        ledger.fail_transaction(tx_hash);

        let err = decode_log(&ledger, &transfer(), &only_log(&ledger)).await.unwrap_err();

        assert!(matches!(err, ScannerError::Decode { .. }));
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn log_without_transaction_hash_is_rejected() {
        let ledger = MockLedger::with_chain(20, 0, 12);
        let log = Log { block_number: Some(1), ..Default::default() };

        let err = decode_log(&ledger, &transfer(), &log).await.unwrap_err();

        assert_eq!(err, ScannerError::decode(None, "log has no transaction hash"));
    }

    #[test]
    fn unnamed_inputs_are_numbered() -> anyhow::Result<()> {
        let interface = json!([{
            "type": "event",
            "name": "Ping",
            "anonymous": false,
            "inputs": [
                {"name": "", "type": "uint8", "indexed": false},
                {"name": "ok", "type": "bool", "indexed": false}
            ]
        }]);
        let ping = ResolvedEvent::resolve(&interface, "Ping")?;
        let body =
            DynSolValue::Tuple(vec![DynSolValue::Uint(U256::from(7), 8), DynSolValue::Bool(false)]);
        let data = LogData::new_unchecked(vec![ping.topic], body.abi_encode_params().into());
        let decoded = ping.event.decode_log(&data)?;
        let event = ping.event;

        assert_eq!(render_args(&event, &decoded), "EventArgs({'arg0': 7, 'ok': False})");

        Ok(())
    }

    #[test]
    fn values_render_as_literals() {
        assert_eq!(render_value(&DynSolValue::Bool(true)), "True");
        assert_eq!(render_value(&DynSolValue::Int(I256::from_dec_str("-42").unwrap(), 256)), "-42");
        assert_eq!(render_value(&DynSolValue::String("it's".into())), r"'it\'s'");
        assert_eq!(render_value(&DynSolValue::Bytes(vec![0xde, 0xad])), "'0xdead'");
        assert_eq!(
            render_value(&DynSolValue::FixedBytes(B256::repeat_byte(0xab), 2)),
            "'0xabab'"
        );
        assert_eq!(
            render_value(&DynSolValue::Array(vec![
                DynSolValue::Uint(U256::from(1), 256),
                DynSolValue::Uint(U256::from(2), 256),
            ])),
            "[1,2]"
        );
        assert_eq!(
            render_value(&DynSolValue::Tuple(vec![
                DynSolValue::Bool(true),
                DynSolValue::Uint(U256::from(9), 256),
            ])),
            "(True,9)"
        );
    }
}
