use async_trait::async_trait;
use url::Url;

use super::{BrokerError, ExchangeError, TokenGrant};

/// Result type for broker operations.
pub type Result<T> = std::result::Result<T, BrokerError>;

/// Client side of the identity broker.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    /// Start authentication for `identifier` and return the URL the browser
    /// should be sent to.
    async fn authenticate(&self, identifier: &str) -> Result<Url>;

    /// Verify an ID token and return the identity it asserts.
    ///
    /// An empty token must be rejected.
    async fn verify(&self, token: &str) -> Result<String>;

    /// Redirect URI registered with the broker.
    fn redirect_uri(&self) -> &str;

    /// Release background tasks and stored state.
    async fn destroy(&self);
}

/// Exchanges authorization codes at the broker's token endpoint.
#[async_trait]
pub trait TokenExchanger: Send + Sync {
    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> std::result::Result<TokenGrant, ExchangeError>;
}
