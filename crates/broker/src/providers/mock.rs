//! Mock broker client for development and testing.
//!
//! Works against `MockBrokerServer`: authentication URLs point at its
//! `/auth` endpoint and tokens are verified with the shared mock secret.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex, PoisonError,
};

use async_trait::async_trait;
use brokerrp_core::rp::{generate_nonce, BrokerClient, BrokerError, Result};
use chrono::Utc;
use tokio::task::JoinHandle;
use url::Url;

use crate::config::BrokerConfig;
use crate::mock_broker::tokens::decode_id_token;
use crate::nonces::{spawn_purge_task, NonceStore, PURGE_INTERVAL};

/// Which flow the mock broker is asked to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MockFlow {
    /// The callback carries an `id_token`.
    #[default]
    Implicit,
    /// The callback carries a `code` to exchange at `/token`.
    Code,
}

/// How the mock broker delivers the callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MockResponseMode {
    /// Auto-submitting form POST, like a real Portier broker.
    #[default]
    FormPost,
    /// 303 redirect with a query string.
    Query,
}

/// Broker client that works with `MockBrokerServer`.
pub struct MockBroker {
    config: BrokerConfig,
    redirect_uri: String,
    flow: MockFlow,
    response_mode: MockResponseMode,
    nonces: NonceStore,
    purge_task: Mutex<Option<JoinHandle<()>>>,
    destroyed: AtomicBool,
}

impl MockBroker {
    /// Create a new MockBroker for the mock broker at `config.broker_url`.
    ///
    /// Starts the nonce purge task, so this must run inside a Tokio runtime.
    pub fn new(config: BrokerConfig) -> Self {
        let nonces = NonceStore::new();
        let purge_task = spawn_purge_task(nonces.clone(), PURGE_INTERVAL);

        Self {
            redirect_uri: config.redirect_uri.to_string(),
            config,
            flow: MockFlow::default(),
            response_mode: MockResponseMode::default(),
            nonces,
            purge_task: Mutex::new(Some(purge_task)),
            destroyed: AtomicBool::new(false),
        }
    }

    pub fn with_flow(mut self, flow: MockFlow) -> Self {
        self.flow = flow;
        self
    }

    pub fn with_response_mode(mut self, mode: MockResponseMode) -> Self {
        self.response_mode = mode;
        self
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.destroyed.load(Ordering::Acquire) {
            return Err(BrokerError::Destroyed);
        }
        Ok(())
    }
}

#[async_trait]
impl BrokerClient for MockBroker {
    async fn authenticate(&self, identifier: &str) -> Result<Url> {
        self.ensure_alive()?;

        let mut url = self
            .config
            .broker_url
            .join("/auth")
            .map_err(|e| BrokerError::Protocol(e.to_string()))?;

        let nonce = generate_nonce();
        let ttl = chrono::Duration::from_std(self.config.nonce_ttl)
            .map_err(|e| BrokerError::Protocol(e.to_string()))?;
        self.nonces.insert(&nonce, Utc::now(), ttl).await;

        let response_type = match self.flow {
            MockFlow::Implicit => "id_token",
            MockFlow::Code => "code",
        };
        let response_mode = match self.response_mode {
            MockResponseMode::FormPost => "form_post",
            MockResponseMode::Query => "query",
        };

        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id())
            .append_pair("login_hint", identifier)
            .append_pair("nonce", &nonce)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("response_type", response_type)
            .append_pair("response_mode", response_mode)
            .append_pair("scope", "openid email");

        Ok(url)
    }

    async fn verify(&self, token: &str) -> Result<String> {
        self.ensure_alive()?;

        if token.is_empty() {
            return Err(BrokerError::InvalidToken("empty token".to_string()));
        }

        let claims = decode_id_token(token, &self.config.issuer(), &self.config.client_id())
            .map_err(|e| BrokerError::InvalidToken(e.to_string()))?;

        if !self.nonces.take(&claims.nonce, Utc::now()).await {
            return Err(BrokerError::InvalidToken(
                "unknown or expired nonce".to_string(),
            ));
        }

        Ok(claims.email)
    }

    fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    async fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }

        let task = self
            .purge_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
        }
        self.nonces.clear().await;
    }
}
