//! Authorization code exchange over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use brokerrp_core::rp::{
    parse_token_reply, token_request_form, ExchangeError, TokenExchanger, TokenGrant,
};
use reqwest::StatusCode;
use url::Url;

/// Exchanges codes at a fixed token endpoint with a single POST.
#[derive(Debug, Clone)]
pub struct HttpTokenExchanger {
    client: reqwest::Client,
    token_endpoint: Url,
}

impl HttpTokenExchanger {
    /// Create an exchanger whose requests give up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `Transport` if the HTTP client cannot be built.
    pub fn new(token_endpoint: Url, timeout: Duration) -> Result<Self, ExchangeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExchangeError::Transport(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            token_endpoint,
        })
    }

    /// Create an exchanger that waits for the token endpoint indefinitely.
    pub fn without_timeout(token_endpoint: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            token_endpoint,
        }
    }

    pub fn token_endpoint(&self) -> &Url {
        &self.token_endpoint
    }
}

#[async_trait]
impl TokenExchanger for HttpTokenExchanger {
    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenGrant, ExchangeError> {
        let response = self
            .client
            .post(self.token_endpoint.clone())
            .form(&token_request_form(code, redirect_uri))
            .send()
            .await
            .map_err(|e| ExchangeError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| ExchangeError::Transport(e.to_string()))?;

        tracing::debug!(%status, endpoint = %self.token_endpoint, "Token endpoint replied");

        parse_token_reply(status == StatusCode::OK, &body)?.into_grant()
    }
}
