use std::time::Duration;

use brokerrp_broker::BrokerConfig;
use url::Url;

use crate::error::RpError;

pub const ENV_HOST: &str = "RP_HOST";
pub const ENV_PORT: &str = "RP_PORT";
pub const ENV_BROKER_URL: &str = "RP_BROKER_URL";
pub const ENV_REDIRECT_URI: &str = "RP_REDIRECT_URI";
pub const ENV_TOKEN_ENDPOINT: &str = "RP_TOKEN_ENDPOINT";
pub const ENV_HTTP_TIMEOUT_SECS: &str = "RP_HTTP_TIMEOUT_SECS";

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 44180;
pub const DEFAULT_BROKER_URL: &str = "http://localhost:44133";
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:44180/verify";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

/// Headroom a request gets on top of the outbound timeout.
const REQUEST_TIMEOUT_MARGIN: Duration = Duration::from_secs(20);

/// Relying party configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Host address to bind to (default: 127.0.0.1)
    pub host: String,
    /// Port to listen on (default: 44180, `0` picks a free one)
    pub port: u16,
    /// Broker origin (default: http://localhost:44133)
    pub broker_url: Url,
    /// Callback URL registered with the broker (default: http://localhost:44180/verify)
    pub redirect_uri: Url,
    /// Where authorization codes are exchanged (default: `{broker_url}/token`)
    pub token_endpoint: Url,
    /// Timeout for outbound broker requests (default: 10s)
    pub http_timeout: Duration,
}

impl Config {
    /// Build a configuration from any key/value source.
    ///
    /// Keys are the `RP_*` environment variable names:
    /// - `RP_HOST` - Bind address (default: "127.0.0.1")
    /// - `RP_PORT` - Listen port (default: 44180)
    /// - `RP_BROKER_URL` - Broker origin (default: "http://localhost:44133")
    /// - `RP_REDIRECT_URI` - Callback URL (default: "http://localhost:44180/verify")
    /// - `RP_TOKEN_ENDPOINT` - Token endpoint (default: broker URL + "/token")
    /// - `RP_HTTP_TIMEOUT_SECS` - Outbound request timeout (default: 10)
    ///
    /// Unset keys take their defaults; so do unparsable numbers. The binary
    /// feeds this from its clap arguments, which fall back to the environment.
    ///
    /// # Errors
    ///
    /// Returns `RpError::Config` if one of the URLs does not parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, RpError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let broker_url = parse_url(
            ENV_BROKER_URL,
            &lookup(ENV_BROKER_URL).unwrap_or_else(|| DEFAULT_BROKER_URL.to_string()),
        )?;

        let token_endpoint = match lookup(ENV_TOKEN_ENDPOINT) {
            Some(value) => parse_url(ENV_TOKEN_ENDPOINT, &value)?,
            None => broker_url.join("/token").map_err(|e| RpError::Config {
                key: ENV_TOKEN_ENDPOINT,
                message: e.to_string(),
            })?,
        };

        Ok(Self {
            host: lookup(ENV_HOST).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: lookup(ENV_PORT)
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            redirect_uri: parse_url(
                ENV_REDIRECT_URI,
                &lookup(ENV_REDIRECT_URI).unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string()),
            )?,
            broker_url,
            token_endpoint,
            http_timeout: Duration::from_secs(
                lookup(ENV_HTTP_TIMEOUT_SECS)
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
            ),
        })
    }

    /// Address to bind the listener to, as `host:port`.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Upper bound for a whole request, always above `http_timeout` so a
    /// slow token endpoint still ends in a `gotError` page.
    pub fn request_timeout(&self) -> Duration {
        self.http_timeout.saturating_add(REQUEST_TIMEOUT_MARGIN)
    }

    /// Settings for the broker client.
    pub fn broker_config(&self) -> BrokerConfig {
        BrokerConfig::new(self.broker_url.clone(), self.redirect_uri.clone())
            .with_http_timeout(Some(self.http_timeout))
    }
}

fn parse_url(key: &'static str, value: &str) -> Result<Url, RpError> {
    Url::parse(value).map_err(|e| RpError::Config {
        key,
        message: format!("{value:?}: {e}"),
    })
}
