//! Event signature resolution from a JSON interface description.

use std::fmt;

use alloy::{
    json_abi::{Event, JsonAbi},
    primitives::{B256, keccak256},
};
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("no event named `{0}` in the interface description")]
    EventNotFound(String),
    #[error("event description is missing its `{0}` field")]
    MissingField(&'static str),
    #[error("interface description must be a JSON array")]
    NotAnArray,
    #[error("malformed event description for `{name}`: {reason}")]
    Malformed { name: String, reason: String },
}

/// An event name and its ordered parameter types.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventSignature {
    pub name: String,
    pub input_types: Vec<String>,
}

impl EventSignature {
    /// Builds a signature from one event description, i.e. an object with `name` and `inputs`.
    ///
    /// # Errors
    ///
    /// [`SignatureError::MissingField`] when `name` or `inputs` is absent.
    pub fn from_description(description: &Value) -> Result<Self, SignatureError> {
        let name = description
            .get("name")
            .and_then(Value::as_str)
            .ok_or(SignatureError::MissingField("name"))?;
        let inputs = description
            .get("inputs")
            .and_then(Value::as_array)
            .ok_or(SignatureError::MissingField("inputs"))?;

        let input_types = inputs.iter().map(canonical_type).collect();
        Ok(Self { name: strip_whitespace(name), input_types })
    }

    /// `name(type1,type2,...)`
    #[must_use]
    pub fn canonical(&self) -> String {
        format!("{}({})", self.name, self.input_types.join(","))
    }

    /// keccak-256 of the canonical form, i.e. the log's first topic.
    #[must_use]
    pub fn topic(&self) -> B256 {
        keccak256(self.canonical().as_bytes())
    }

    /// The topic as `0x`-prefixed lowercase hex.
    #[must_use]
    pub fn topic_hex(&self) -> String {
        format!("{:#x}", self.topic())
    }
}

impl fmt::Display for EventSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

/// An event located in an interface set, ready for filtering and decoding.
#[derive(Debug, Clone)]
pub struct ResolvedEvent {
    pub signature: EventSignature,
    pub topic: B256,
    /// Typed description used to decode log data.
    pub event: Event,
}

impl ResolvedEvent {
    /// Finds the event named `event_name` in `interface` (a JSON ABI array) and derives its
    /// signature and topic.
    ///
    /// # Errors
    ///
    /// * [`SignatureError::NotAnArray`] if `interface` is not an array.
    /// * [`SignatureError::EventNotFound`] if no entry has `"type": "event"` and that name.
    /// * [`SignatureError::MissingField`] if the entry lacks `name` or `inputs`.
    /// * [`SignatureError::Malformed`] if the entry cannot be read as an event description.
    pub fn resolve(interface: &Value, event_name: &str) -> Result<Self, SignatureError> {
        let entries = interface.as_array().ok_or(SignatureError::NotAnArray)?;

        let description = entries
            .iter()
            .find(|entry| {
                entry.get("type").and_then(Value::as_str) == Some("event")
                    && entry.get("name").and_then(Value::as_str) == Some(event_name)
            })
            .ok_or_else(|| SignatureError::EventNotFound(event_name.to_owned()))?;

        let signature = EventSignature::from_description(description)?;
        let malformed = |reason: String| SignatureError::Malformed {
            name: event_name.to_owned(),
            reason,
        };
        let single: JsonAbi = serde_json::from_value(Value::Array(vec![description.clone()]))
            .map_err(|e| malformed(e.to_string()))?;
        let event = single
            .events()
            .next()
            .cloned()
            .ok_or_else(|| malformed("entry is not an event".to_owned()))?;

        let topic = signature.topic();
        debug!(signature = %signature, topic = %topic, "Resolved event signature");

        Ok(Self { signature, topic, event })
    }
}

// `tuple` parameters are spelled out from their components, keeping any array suffix.
fn canonical_type(param: &Value) -> String {
    let ty = strip_whitespace(param.get("type").and_then(Value::as_str).unwrap_or_default());

    match (ty.strip_prefix("tuple"), param.get("components").and_then(Value::as_array)) {
        (Some(suffix), Some(components)) => {
            let inner: Vec<String> = components.iter().map(canonical_type).collect();
            format!("({}){suffix}", inner.join(","))
        }
        _ => ty,
    }
}

fn strip_whitespace(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn transfer_abi() -> Value {
        json!([
            {
                "type": "function",
                "name": "transfer",
                "inputs": [{"name": "to", "type": "address"}, {"name": "value", "type": "uint256"}],
                "outputs": [{"name": "", "type": "bool"}],
                "stateMutability": "nonpayable"
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
            }
        ])
    }

    #[test]
    fn resolves_erc20_transfer() -> anyhow::Result<()> {
        let resolved = ResolvedEvent::resolve(&transfer_abi(), "Transfer")?;

        assert_eq!(resolved.signature.canonical(), "Transfer(address,address,uint256)");
        assert_eq!(
            resolved.signature.topic_hex(),
            "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
        );
        assert_eq!(resolved.topic, resolved.event.selector());

        Ok(())
    }

    #[test]
    fn resolution_is_deterministic() -> anyhow::Result<()> {
        let first = ResolvedEvent::resolve(&transfer_abi(), "Transfer")?;
        let second = ResolvedEvent::resolve(&transfer_abi(), "Transfer")?;

        assert_eq!(first.signature, second.signature);
        assert_eq!(first.topic, second.topic);

        Ok(())
    }

    #[test]
    fn functions_with_the_same_name_are_not_events() {
        let err = ResolvedEvent::resolve(&transfer_abi(), "transfer").unwrap_err();
        assert_eq!(err, SignatureError::EventNotFound("transfer".into()));
    }

    #[test]
    fn missing_inputs_is_rejected() {
        let abi = json!([{"type": "event", "name": "Ping"}]);
        let err = ResolvedEvent::resolve(&abi, "Ping").unwrap_err();
        assert_eq!(err, SignatureError::MissingField("inputs"));
    }

    #[test]
    fn description_without_name_is_rejected() {
        let err = EventSignature::from_description(&json!({"inputs": []})).unwrap_err();
        assert_eq!(err, SignatureError::MissingField("name"));
    }

    #[test]
    fn non_array_interface_is_rejected() {
        let err = ResolvedEvent::resolve(&json!({"type": "event"}), "Transfer").unwrap_err();
        assert_eq!(err, SignatureError::NotAnArray);
    }

    #[test]
    fn canonical_form_drops_whitespace_and_keeps_order() -> anyhow::Result<()> {
        let sig = EventSignature::from_description(&json!({
            "name": "Swap",
            "inputs": [{"type": "uint256 "}, {"type": " address"}, {"type": "bytes32[]"}]
        }))?;

        assert_eq!(sig.canonical(), "Swap(uint256,address,bytes32[])");

        Ok(())
    }

    #[test]
    fn tuple_inputs_are_expanded() -> anyhow::Result<()> {
        let sig = EventSignature::from_description(&json!({
            "name": "OrderFilled",
            "inputs": [
                {"type": "tuple[]", "components": [{"type": "address"}, {"type": "uint96"}]},
                {"type": "bool"}
            ]
        }))?;

        assert_eq!(sig.canonical(), "OrderFilled((address,uint96)[],bool)");

        Ok(())
    }
}
