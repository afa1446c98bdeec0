//! Retrying ledger client built on Alloy providers.
//!
//! [`RobustProvider`] wraps an Alloy [`RootProvider`](alloy::providers::RootProvider) and adds:
//! * bounded per-call timeouts
//! * exponential backoff retries
//! * transparent failover between a primary and one or more fallback providers
//!
//! It is the production implementation of [`LedgerClient`](crate::LedgerClient). The scanners
//! never retry on their own, so retry and timeout policy is configured here.
//!
//! # Examples
//!
//! ```rust,no_run
//! use alloy::{eips::BlockNumberOrTag, network::Ethereum};
//! use event_range_scanner::robust_provider::RobustProviderBuilder;
//! use std::time::Duration;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let robust = RobustProviderBuilder::<Ethereum, _>::new("https://eth.llamarpc.com")
//!     .fallback("https://rpc.ankr.com/eth")
//!     .call_timeout(Duration::from_secs(30))
//!     .max_retries(5)
//!     .build()
//!     .await?;
//!
//! let head = robust.get_block_by_number(BlockNumberOrTag::Latest).await?;
//! println!("Current block: {}", head.header.number);
//! # Ok(()) }
//! ```

pub mod builder;
pub mod provider;
pub mod provider_conversion;

pub use builder::*;
pub use provider::{Error, RobustProvider};
pub use provider_conversion::IntoRootProvider;
