use std::fmt;

use alloy::{primitives::Address, rpc::types::Filter};
use serde_json::Value;

use crate::signature::{ResolvedEvent, SignatureError};

/// One contract address and one of its events.
#[derive(Debug, Clone)]
pub struct EventFilter {
    address: Address,
    event: ResolvedEvent,
}

impl EventFilter {
    /// Resolves `event_name` in `interface` (a JSON ABI array) for the contract at `address`.
    ///
    /// # Errors
    ///
    /// See [`ResolvedEvent::resolve`].
    pub fn resolve(
        address: Address,
        interface: &Value,
        event_name: &str,
    ) -> Result<Self, SignatureError> {
        Ok(Self { address, event: ResolvedEvent::resolve(interface, event_name)? })
    }

    #[must_use]
    pub fn address(&self) -> Address {
        self.address
    }

    #[must_use]
    pub fn event(&self) -> &ResolvedEvent {
        &self.event
    }
}

impl fmt::Display for EventFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.event.signature, self.address)
    }
}

impl From<&EventFilter> for Filter {
    fn from(filter: &EventFilter) -> Self {
        Filter::new().address(filter.address).event_signature(filter.event.topic)
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::address;

    use super::*;
    use crate::test_utils::{TRANSFER_TOPIC, erc20_interface};

    #[test]
    fn log_filter_matches_address_and_topic() -> anyhow::Result<()> {
        let token = address!("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");
        let filter = EventFilter::resolve(token, &erc20_interface(), "Transfer")?;

        let log_filter = Filter::from(&filter);

        assert!(log_filter.address.matches(&token));
        assert!(!log_filter.address.matches(&Address::ZERO));
        assert!(log_filter.topics[0].matches(&TRANSFER_TOPIC));
        assert_eq!(log_filter.get_from_block(), None);

        Ok(())
    }

    #[test]
    fn display_names_signature_and_address() -> anyhow::Result<()> {
        let filter = EventFilter::resolve(Address::ZERO, &erc20_interface(), "Approval")?;

        assert_eq!(
            filter.to_string(),
            "Approval(address,address,uint256)@0x0000000000000000000000000000000000000000"
        );

        Ok(())
    }
}
