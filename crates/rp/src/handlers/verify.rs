//! Broker callback handling.

use std::collections::HashMap;

use axum::{
    extract::{rejection::FormRejection, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Form,
};
use brokerrp_core::rp::{verify_callback, CallbackParams, VerifyOutcome};

use crate::{state::AppState, templates};

/// Handler for GET /verify. Parameters come from the query string.
#[axum::debug_handler]
pub async fn verify_get(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    handle_callback(&state, CallbackParams::from_map(query)).await
}

/// Handler for POST /verify.
///
/// The form body is used when it has at least one field, the query string
/// otherwise. A body that is not a form counts as empty.
#[axum::debug_handler]
pub async fn verify_post(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    body: Result<Form<HashMap<String, String>>, FormRejection>,
) -> Response {
    let body = match body {
        Ok(Form(body)) => body,
        Err(rejection) => {
            tracing::debug!(%rejection, "Ignoring callback body");
            HashMap::new()
        }
    };

    handle_callback(&state, CallbackParams::merge(body, query)).await
}

async fn handle_callback(state: &AppState, params: CallbackParams) -> Response {
    let outcome = verify_callback(
        params,
        state.broker.as_ref(),
        state.exchanger.as_ref(),
        &state.events,
    )
    .await;

    match outcome {
        VerifyOutcome::Verified(identity) => {
            tracing::info!(%identity, "Callback verified");
            Html(templates::confirmed_page(&identity)).into_response()
        }
        VerifyOutcome::GotError => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Html(templates::got_error_page()),
        )
            .into_response(),
        VerifyOutcome::InvalidToken => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Html(templates::invalid_token_page()),
        )
            .into_response(),
    }
}
