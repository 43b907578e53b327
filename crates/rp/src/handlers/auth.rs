//! Authentication initiation.

use axum::{
    extract::State,
    response::Redirect,
    Form,
};
use serde::Deserialize;

use crate::{error::RpError, state::AppState};

#[derive(Deserialize)]
pub struct AuthForm {
    #[serde(default)]
    pub email: String,
}

/// Handler for POST /auth
///
/// Asks the broker client for an authorization URL and sends the browser
/// there with a 303. An empty `email` is passed through; rejecting it is the
/// broker's call. Failures render the generic error page and never echo the
/// identifier.
#[axum::debug_handler]
pub async fn start_auth(
    State(state): State<AppState>,
    Form(form): Form<AuthForm>,
) -> Result<Redirect, RpError> {
    let auth_url = state.broker.authenticate(&form.email).await?;

    tracing::debug!(broker = %auth_url.origin().ascii_serialization(), "Redirecting to broker");

    Ok(Redirect::to(auth_url.as_str()))
}
