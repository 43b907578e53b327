use std::time::Duration;

use brokerrp_core::rp::BrokerError;
use url::Url;

/// How long an authentication request's nonce stays redeemable.
pub const DEFAULT_NONCE_TTL: Duration = Duration::from_secs(15 * 60);

/// Default timeout for outbound requests to the broker.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings for an identity broker.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Broker origin, also the expected token issuer.
    pub broker_url: Url,
    /// Where the broker sends the browser back to.
    pub redirect_uri: Url,
    /// Timeout for discovery and token endpoint requests. `None` waits forever.
    pub http_timeout: Option<Duration>,
    pub nonce_ttl: Duration,
}

impl BrokerConfig {
    pub fn new(broker_url: Url, redirect_uri: Url) -> Self {
        Self {
            broker_url,
            redirect_uri,
            http_timeout: Some(DEFAULT_HTTP_TIMEOUT),
            nonce_ttl: DEFAULT_NONCE_TTL,
        }
    }

    pub fn with_http_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// The client id a broker expects: the origin of the redirect URI.
    pub fn client_id(&self) -> String {
        self.redirect_uri.origin().ascii_serialization()
    }

    /// Token endpoint of the broker (`{broker}/token`).
    ///
    /// # Errors
    ///
    /// Returns `Protocol` if the broker URL cannot be a base URL.
    pub fn token_endpoint(&self) -> Result<Url, BrokerError> {
        self.broker_url
            .join("/token")
            .map_err(|e| BrokerError::Protocol(e.to_string()))
    }

    /// Broker URL without a trailing slash, the form issuers use.
    pub fn issuer(&self) -> String {
        self.broker_url.as_str().trim_end_matches('/').to_string()
    }
}
