//! Mock broker server for development and testing.
//!
//! Simulates the broker side of the handshake so the relying party can be
//! exercised end to end without a real broker or a mailbox.

use std::net::SocketAddr;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::Deserialize;
use tokio::{net::TcpListener, sync::oneshot, task::JoinHandle};

use super::templates;
use super::tokens::{decode_code, encode_code, issue_id_token, MockCode};

#[derive(Clone)]
struct MockBrokerState {
    issuer: String,
}

/// An authentication request, as received by `/auth` and carried through
/// the confirmation form to `/auth/confirm`.
#[derive(Deserialize)]
struct AuthRequest {
    client_id: String,
    login_hint: String,
    nonce: String,
    redirect_uri: String,
    #[serde(default)]
    response_type: String,
    #[serde(default)]
    response_mode: String,
    #[serde(default)]
    state: String,
    /// Only set by the confirmation form.
    decision: Option<String>,
}

impl AuthRequest {
    fn hidden_fields(&self) -> Vec<(&str, &str)> {
        vec![
            ("client_id", self.client_id.as_str()),
            ("login_hint", self.login_hint.as_str()),
            ("nonce", self.nonce.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("response_type", self.response_type.as_str()),
            ("response_mode", self.response_mode.as_str()),
            ("state", self.state.as_str()),
        ]
    }
}

#[derive(Deserialize)]
struct TokenForm {
    #[serde(default)]
    grant_type: String,
    #[serde(default)]
    code: String,
    #[serde(default)]
    redirect_uri: String,
}

/// Mock broker that simulates the authorization and token endpoints.
pub struct MockBrokerServer {
    port: u16,
}

impl MockBrokerServer {
    /// Create a new mock broker.
    ///
    /// # Arguments
    /// * `port` - The port to listen on (`0` picks a free one)
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    /// Router for a broker whose tokens name `issuer`.
    ///
    /// Routes:
    /// - `GET /auth` - Confirmation page for an authentication request
    /// - `POST /auth/confirm` - Delivers the callback to the redirect URI
    /// - `POST /token` - Exchanges authorization codes for ID tokens
    pub fn router(issuer: impl Into<String>) -> Router {
        let state = MockBrokerState {
            issuer: issuer.into(),
        };

        Router::new()
            .route("/auth", get(authorize))
            .route("/auth/confirm", post(confirm))
            .route("/token", post(token))
            .with_state(state)
    }

    /// Run the mock broker until the process exits.
    pub async fn run(self) -> Result<(), std::io::Error> {
        let (listener, addr) = self.bind().await?;
        tracing::info!("Mock broker listening on http://{}", addr);

        axum::serve(listener, Self::router(format!("http://{}", addr))).await
    }

    /// Start the mock broker in the background.
    pub async fn spawn(self) -> Result<MockBrokerHandle, std::io::Error> {
        let (listener, addr) = self.bind().await?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let app = Self::router(format!("http://{}", addr));

        let task = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = result {
                tracing::error!(error = %e, "Mock broker stopped with an error");
            }
        });

        tracing::info!("Mock broker listening on http://{}", addr);

        Ok(MockBrokerHandle {
            addr,
            shutdown: Some(shutdown_tx),
            task,
        })
    }

    async fn bind(&self) -> Result<(TcpListener, SocketAddr), std::io::Error> {
        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], self.port))).await?;
        let addr = listener.local_addr()?;
        Ok((listener, addr))
    }
}

/// A mock broker running in the background.
pub struct MockBrokerHandle {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl MockBrokerHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Broker origin, e.g. `http://127.0.0.1:44133`.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Stop accepting connections and wait for the server task to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = (&mut self.task).await;
    }
}

async fn authorize(Query(request): Query<AuthRequest>) -> Html<String> {
    Html(templates::confirm_page(
        &request.login_hint,
        &request.hidden_fields(),
    ))
}

async fn confirm(State(state): State<MockBrokerState>, Form(request): Form<AuthRequest>) -> Response {
    let mut params: Vec<(&str, String)> = Vec::new();

    if request.decision.as_deref() != Some("allow") {
        params.push(("error", "access_denied".to_string()));
        params.push((
            "error_description",
            "The user denied the request".to_string(),
        ));
    } else if request.response_type == "code" {
        let code = MockCode {
            email: request.login_hint.clone(),
            nonce: request.nonce.clone(),
            client_id: request.client_id.clone(),
            redirect_uri: request.redirect_uri.clone(),
        };
        params.push(("code", encode_code(&code)));
    } else {
        match issue_id_token(
            &state.issuer,
            &request.client_id,
            &request.login_hint,
            &request.nonce,
        ) {
            Ok(id_token) => params.push(("id_token", id_token)),
            Err(e) => {
                tracing::error!(error = %e, "Mock broker failed to sign token");
                params.push(("error", "server_error".to_string()));
                params.push(("error_description", e.to_string()));
            }
        }
    }

    if !request.state.is_empty() {
        params.push(("state", request.state.clone()));
    }

    deliver(&request, &params)
}

/// Send the callback parameters to the redirect URI.
///
/// `response_mode=query` redirects with a query string; anything else uses
/// an auto-submitting form POST.
fn deliver(request: &AuthRequest, params: &[(&str, String)]) -> Response {
    if request.response_mode == "query" {
        let query = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        let separator = if request.redirect_uri.contains('?') {
            '&'
        } else {
            '?'
        };
        let callback_url = format!("{}{}{}", request.redirect_uri, separator, query);
        return Redirect::to(&callback_url).into_response();
    }

    let fields: Vec<(&str, &str)> = params.iter().map(|(k, v)| (*k, v.as_str())).collect();
    Html(templates::form_post_page(&request.redirect_uri, &fields)).into_response()
}

async fn token(State(state): State<MockBrokerState>, Form(form): Form<TokenForm>) -> Response {
    if form.grant_type != "authorization_code" {
        return token_error(
            "unsupported_grant_type",
            "only authorization_code is supported",
        );
    }

    let Some(code) = decode_code(&form.code) else {
        return token_error("invalid_grant", "unknown authorization code");
    };

    if code.redirect_uri != form.redirect_uri {
        return token_error("invalid_grant", "redirect_uri does not match");
    }

    match issue_id_token(&state.issuer, &code.client_id, &code.email, &code.nonce) {
        Ok(id_token) => Json(serde_json::json!({
            "id_token": id_token,
            "token_type": "bearer",
        }))
        .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({
                "error": "server_error",
                "error_description": e.to_string(),
            })),
        )
            .into_response(),
    }
}

fn token_error(error: &str, description: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({
            "error": error,
            "error_description": description,
        })),
    )
        .into_response()
}
