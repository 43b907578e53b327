use axum::{
    http::StatusCode,
    routing::{get, post},
    Router,
};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::{
    handlers::{index, start_auth, verify_get, verify_post},
    state::AppState,
};

/// Create the relying party router with all routes and middleware.
///
/// Requests running longer than `state.request_timeout` get a 408.
pub fn create_app(state: AppState) -> Router {
    let request_timeout = state.request_timeout;

    Router::new()
        .route("/", get(index))
        .route("/auth", post(start_auth))
        .route("/verify", get(verify_get).post(verify_post))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .with_state(state)
}
