use alloy::{network::Network, providers::RootProvider, transports::http::reqwest::Url};

use crate::robust_provider::provider::Error;

/// Endpoints [`RobustProviderBuilder`](crate::robust_provider::RobustProviderBuilder) can
/// connect to: an RPC URL, as text or parsed, or an already built [`RootProvider`].
pub trait IntoRootProvider<N: Network> {
    /// Connects to the endpoint.
    ///
    /// # Errors
    ///
    /// The transport could not be established.
    fn into_root_provider(self) -> impl Future<Output = Result<RootProvider<N>, Error>> + Send;
}

impl<N: Network> IntoRootProvider<N> for RootProvider<N> {
    async fn into_root_provider(self) -> Result<RootProvider<N>, Error> {
        Ok(self)
    }
}

impl<N: Network> IntoRootProvider<N> for &str {
    async fn into_root_provider(self) -> Result<RootProvider<N>, Error> {
        Ok(RootProvider::connect(self).await?)
    }
}

impl<N: Network> IntoRootProvider<N> for Url {
    async fn into_root_provider(self) -> Result<RootProvider<N>, Error> {
        Ok(RootProvider::connect(self.as_str()).await?)
    }
}
