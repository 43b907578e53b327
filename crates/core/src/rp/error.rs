use thiserror::Error;

/// Failures reported by a broker client.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// The broker could not be reached.
    #[error("broker request failed: {0}")]
    Network(String),

    /// The broker answered with something we could not use.
    #[error("broker protocol error: {0}")]
    Protocol(String),

    /// The token is empty, malformed, expired or was rejected.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// The client was torn down and no longer serves requests.
    #[error("broker client has been destroyed")]
    Destroyed,
}

/// Failures of the authorization code exchange.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    /// The request never produced a response (connect error, timeout, ...).
    #[error("token endpoint request failed: {0}")]
    Transport(String),

    /// The token endpoint answered with a non-success status.
    #[error("token endpoint returned `{error}`: {description}")]
    Endpoint { error: String, description: String },

    /// A success response whose body could not be parsed.
    #[error("invalid token endpoint response: {0}")]
    InvalidResponse(String),
}
