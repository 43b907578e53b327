//! Portier-style broker client.
//!
//! Authentication uses the implicit flow with `response_mode=form_post`: the
//! broker posts an ID token straight back to the redirect URI. The token is
//! verified against the broker's published keys and must carry a nonce this
//! client issued.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex, PoisonError,
};

use async_trait::async_trait;
use brokerrp_core::rp::{generate_nonce, BrokerClient, BrokerError, Result};
use chrono::Utc;
use openidconnect::{
    core::{CoreAuthenticationFlow, CoreClient, CoreIdToken, CoreProviderMetadata},
    reqwest, ClientId, CsrfToken, EndpointMaybeSet, EndpointSet, IssuerUrl, Nonce, RedirectUrl,
    Scope,
};
use tokio::task::JoinHandle;
use url::Url;

use crate::config::BrokerConfig;
use crate::nonces::{spawn_purge_task, NonceStore, PURGE_INTERVAL};

/// Type alias for a CoreClient configured from provider metadata.
///
/// `from_provider_metadata` sets the authorization URL, leaves device,
/// introspection and revocation URLs unset and may or may not set token and
/// userinfo URLs. `set_redirect_uri` preserves these type parameters.
type ConfiguredCoreClient = CoreClient<
    EndpointSet,
    openidconnect::EndpointNotSet,
    openidconnect::EndpointNotSet,
    openidconnect::EndpointNotSet,
    EndpointMaybeSet,
    EndpointMaybeSet,
>;

/// Client for a Portier broker.
pub struct PortierBroker {
    client: ConfiguredCoreClient,
    config: BrokerConfig,
    redirect_uri: String,
    nonces: NonceStore,
    purge_task: Mutex<Option<JoinHandle<()>>>,
    destroyed: AtomicBool,
}

impl PortierBroker {
    /// Create a client by discovering the broker's OIDC metadata and keys.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The broker or redirect URL is invalid
    /// - Discovery fails (network error or invalid metadata)
    pub async fn new(config: BrokerConfig) -> Result<Self> {
        let issuer_url =
            IssuerUrl::new(config.issuer()).map_err(|e| BrokerError::Protocol(e.to_string()))?;

        // Build HTTP client without redirect following
        let mut builder = reqwest::ClientBuilder::new().redirect(reqwest::redirect::Policy::none());
        if let Some(timeout) = config.http_timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder
            .build()
            .map_err(|e| BrokerError::Network(format!("Failed to build HTTP client: {}", e)))?;

        let provider_metadata = CoreProviderMetadata::discover_async(issuer_url, &http_client)
            .await
            .map_err(|e| BrokerError::Network(e.to_string()))?;

        let client = CoreClient::from_provider_metadata(
            provider_metadata,
            ClientId::new(config.client_id()),
            None,
        )
        .set_redirect_uri(
            RedirectUrl::new(config.redirect_uri.to_string())
                .map_err(|e| BrokerError::Protocol(e.to_string()))?,
        );

        let nonces = NonceStore::new();
        let purge_task = spawn_purge_task(nonces.clone(), PURGE_INTERVAL);

        tracing::info!(broker = %config.broker_url, client_id = %config.client_id(), "Discovered broker");

        Ok(Self {
            client,
            redirect_uri: config.redirect_uri.to_string(),
            config,
            nonces,
            purge_task: Mutex::new(Some(purge_task)),
            destroyed: AtomicBool::new(false),
        })
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.destroyed.load(Ordering::Acquire) {
            return Err(BrokerError::Destroyed);
        }
        Ok(())
    }
}

#[async_trait]
impl BrokerClient for PortierBroker {
    async fn authenticate(&self, identifier: &str) -> Result<Url> {
        self.ensure_alive()?;

        let nonce = generate_nonce();
        let ttl = chrono::Duration::from_std(self.config.nonce_ttl)
            .map_err(|e| BrokerError::Protocol(e.to_string()))?;
        self.nonces.insert(&nonce, Utc::now(), ttl).await;

        let login_hint = identifier.to_string();
        let (auth_url, _csrf_token, _nonce) = self
            .client
            .authorize_url(
                CoreAuthenticationFlow::Implicit(false),
                CsrfToken::new_random,
                move || Nonce::new(nonce),
            )
            .add_scope(Scope::new("email".to_string()))
            .add_extra_param("login_hint", login_hint)
            .add_extra_param("response_mode", "form_post")
            .url();

        Ok(auth_url)
    }

    async fn verify(&self, token: &str) -> Result<String> {
        self.ensure_alive()?;

        if token.is_empty() {
            return Err(BrokerError::InvalidToken("empty token".to_string()));
        }

        let id_token: CoreIdToken = token
            .parse()
            .map_err(|e| BrokerError::InvalidToken(format!("{}", e)))?;

        // The nonce store is async, so capture the nonce here and redeem it
        // once the signature and standard claims have checked out.
        let mut token_nonce = None;
        let claims = id_token
            .claims(&self.client.id_token_verifier(), |nonce: Option<&Nonce>| {
                token_nonce = nonce.map(|n| n.secret().clone());
                Ok::<(), String>(())
            })
            .map_err(|e| BrokerError::InvalidToken(e.to_string()))?;

        let email = claims
            .email()
            .map(|e| e.to_string())
            .ok_or_else(|| BrokerError::InvalidToken("missing email claim".to_string()))?;

        let nonce =
            token_nonce.ok_or_else(|| BrokerError::InvalidToken("missing nonce".to_string()))?;
        if !self.nonces.take(&nonce, Utc::now()).await {
            return Err(BrokerError::InvalidToken(
                "unknown or expired nonce".to_string(),
            ));
        }

        Ok(email)
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

        tracing::debug!("Broker client destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup_mock_broker() -> MockServer {
        let server = MockServer::start().await;
        let issuer = server.uri();

        Mock::given(method("GET"))
            .and(path("/.well-known/openid-configuration"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "issuer": issuer,
                "authorization_endpoint": format!("{}/auth", issuer),
                "token_endpoint": format!("{}/token", issuer),
                "jwks_uri": format!("{}/keys.json", issuer),
                "scopes_supported": ["openid", "email"],
                "response_types_supported": ["id_token", "code"],
                "response_modes_supported": ["form_post", "fragment"],
                "grant_types_supported": ["implicit", "authorization_code"],
                "subject_types_supported": ["public"],
                "id_token_signing_alg_values_supported": ["RS256"],
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/keys.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "keys": []
            })))
            .mount(&server)
            .await;

        server
    }

    async fn broker(server: &MockServer) -> PortierBroker {
        let config = BrokerConfig::new(
            Url::parse(&server.uri()).unwrap(),
            Url::parse("http://localhost:44180/verify").unwrap(),
        );
        PortierBroker::new(config).await.unwrap()
    }

    fn query(url: &Url, key: &str) -> Option<String> {
        url.query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    #[tokio::test]
    async fn authenticate_builds_implicit_form_post_request() {
        let server = setup_mock_broker().await;
        let broker = broker(&server).await;

        let url = broker.authenticate("user@example.com").await.unwrap();

        assert_eq!(url.path(), "/auth");
        assert_eq!(query(&url, "login_hint").as_deref(), Some("user@example.com"));
        assert_eq!(query(&url, "response_type").as_deref(), Some("id_token"));
        assert_eq!(query(&url, "response_mode").as_deref(), Some("form_post"));
        assert_eq!(query(&url, "client_id").as_deref(), Some("http://localhost:44180"));
        assert_eq!(
            query(&url, "redirect_uri").as_deref(),
            Some("http://localhost:44180/verify")
        );
        assert!(query(&url, "scope").unwrap().contains("email"));
        assert!(query(&url, "nonce").is_some());
        assert_eq!(broker.nonces.len().await, 1);
    }

    #[tokio::test]
    async fn discovery_failure_is_a_network_error() {
        let server = MockServer::start().await;
        let config = BrokerConfig::new(
            Url::parse(&server.uri()).unwrap(),
            Url::parse("http://localhost:44180/verify").unwrap(),
        );

        let result = PortierBroker::new(config).await;
        assert!(matches!(result, Err(BrokerError::Network(_))));
    }

    #[tokio::test]
    async fn verify_rejects_empty_token() {
        let server = setup_mock_broker().await;
        let broker = broker(&server).await;

        let err = broker.verify("").await.unwrap_err();
        assert!(matches!(err, BrokerError::InvalidToken(_)));
    }

    #[tokio::test]
    async fn verify_rejects_malformed_token() {
        let server = setup_mock_broker().await;
        let broker = broker(&server).await;

        let err = broker.verify("abc.def.ghi").await.unwrap_err();
        assert!(matches!(err, BrokerError::InvalidToken(_)));
    }

    #[tokio::test]
    async fn destroy_is_idempotent_and_disables_client() {
        let server = setup_mock_broker().await;
        let broker = broker(&server).await;
        broker.authenticate("user@example.com").await.unwrap();

        broker.destroy().await;
        broker.destroy().await;

        assert!(broker.nonces.is_empty().await);
        assert_eq!(
            broker.authenticate("user@example.com").await.unwrap_err(),
            BrokerError::Destroyed
        );
        assert_eq!(broker.verify("t").await.unwrap_err(), BrokerError::Destroyed);
    }

    #[tokio::test]
    async fn redirect_uri_is_fixed() {
        let server = setup_mock_broker().await;
        let broker = broker(&server).await;
        assert_eq!(broker.redirect_uri(), "http://localhost:44180/verify");
    }
}
