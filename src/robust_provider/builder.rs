use std::{pin::Pin, time::Duration};

use alloy::{network::Network, providers::RootProvider};

use crate::robust_provider::{IntoRootProvider, RobustProvider, provider::Error};

type BoxedProviderFuture<N> = Pin<Box<dyn Future<Output = Result<RootProvider<N>, Error>> + Send>>;

/// Default timeout of a single ledger call, retries included.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);
/// Default maximum number of retry attempts.
pub const DEFAULT_MAX_RETRIES: usize = 3;
/// Default base delay between retries.
pub const DEFAULT_MIN_DELAY: Duration = Duration::from_secs(1);

/// Builder for constructing a [`RobustProvider`].
///
/// Use this to configure timeouts, retry/backoff, and one or more fallback providers.
pub struct RobustProviderBuilder<N: Network, P: IntoRootProvider<N>> {
    primary_provider: P,
    fallback_providers: Vec<BoxedProviderFuture<N>>,
    call_timeout: Duration,
    max_retries: usize,
    min_delay: Duration,
}

impl<N: Network, P: IntoRootProvider<N>> RobustProviderBuilder<N, P> {
    /// Create a new builder with default settings.
    ///
    /// The provided provider is treated as the primary provider.
    #[must_use]
    pub fn new(provider: P) -> Self {
        Self {
            primary_provider: provider,
            fallback_providers: vec![],
            call_timeout: DEFAULT_CALL_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            min_delay: DEFAULT_MIN_DELAY,
        }
    }

    /// Create a builder with no retry attempts and only the timeout set.
    #[must_use]
    pub fn fragile(provider: P) -> Self {
        Self::new(provider).max_retries(0).min_delay(Duration::ZERO)
    }

    /// Add a fallback provider, used when the primary provider times out or fails.
    #[must_use]
    pub fn fallback<F: IntoRootProvider<N> + Send + 'static>(mut self, provider: F) -> Self {
        self.fallback_providers.push(Box::pin(provider.into_root_provider()));
        self
    }

    /// Set the maximum duration of one call, retries included.
    #[must_use]
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Set the maximum number of retry attempts.
    #[must_use]
    pub fn max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the base delay for exponential backoff retries.
    #[must_use]
    pub fn min_delay(mut self, min_delay: Duration) -> Self {
        self.min_delay = min_delay;
        self
    }

    /// Consume the builder and connect every provider.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the providers fail to connect.
    pub async fn build(self) -> Result<RobustProvider<N>, Error> {
        debug!(
            call_timeout_ms = self.call_timeout.as_millis(),
            max_retries = self.max_retries,
            fallback_count = self.fallback_providers.len(),
            "Building RobustProvider"
        );

        let primary_provider = self.primary_provider.into_root_provider().await?;

        let mut fallback_providers = Vec::with_capacity(self.fallback_providers.len());
        for (idx, fallback) in self.fallback_providers.into_iter().enumerate() {
            trace!(fallback_index = idx, "Connecting fallback provider");
            fallback_providers.push(fallback.await?);
        }

        info!(fallback_count = fallback_providers.len(), "RobustProvider initialized");

        Ok(RobustProvider {
            primary_provider,
            fallback_providers,
            call_timeout: self.call_timeout,
            max_retries: self.max_retries,
            min_delay: self.min_delay,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::{network::Ethereum, providers::mock::Asserter, rpc::client::RpcClient};

    fn mocked() -> RootProvider<Ethereum> {
        RootProvider::new(RpcClient::mocked(Asserter::new()))
    }

    #[tokio::test]
    async fn builder_defaults() -> anyhow::Result<()> {
        let robust = RobustProviderBuilder::new(mocked()).build().await?;

        assert_eq!(robust.call_timeout, DEFAULT_CALL_TIMEOUT);
        assert_eq!(robust.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(robust.min_delay, DEFAULT_MIN_DELAY);
        assert!(robust.fallback_providers.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn fragile_disables_retries() -> anyhow::Result<()> {
        let robust = RobustProviderBuilder::fragile(mocked())
            .call_timeout(Duration::from_secs(5))
            .build()
            .await?;

        assert_eq!(robust.max_retries, 0);
        assert_eq!(robust.min_delay, Duration::ZERO);
        assert_eq!(robust.call_timeout, Duration::from_secs(5));

        Ok(())
    }

    #[tokio::test]
    async fn builder_collects_fallbacks() -> anyhow::Result<()> {
        let robust = RobustProviderBuilder::new(mocked())
            .fallback(mocked())
            .fallback(mocked())
            .build()
            .await?;

        assert_eq!(robust.fallback_providers.len(), 2);

        Ok(())
    }
}
