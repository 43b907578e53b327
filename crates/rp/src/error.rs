use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use brokerrp_core::rp::BrokerError;

use crate::templates;

/// Errors raised by the relying party outside the `/verify` state machine.
#[derive(Debug, thiserror::Error)]
pub enum RpError {
    #[error("invalid {key}: {message}")]
    Config { key: &'static str, message: String },

    #[error("broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Renders the generic error page. The error itself only goes to the log,
/// never to the response body.
impl IntoResponse for RpError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "RP request failed");

        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Html(templates::error_page()),
        )
            .into_response()
    }
}
