use rand::{distr::Alphanumeric, Rng};
use serde::Deserialize;

use super::{ExchangeError, TokenEndpointReply};

/// Generate a random nonce for an authentication request.
pub fn generate_nonce() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

/// Form payload for the authorization code grant.
pub fn token_request_form<'a>(code: &'a str, redirect_uri: &'a str) -> [(&'static str, &'a str); 3] {
    [
        ("grant_type", "authorization_code"),
        ("code", code),
        ("redirect_uri", redirect_uri),
    ]
}

#[derive(Deserialize, Default)]
struct RawTokenBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    error_description: String,
    #[serde(default)]
    id_token: String,
}

/// Parse a token endpoint response.
///
/// The HTTP status decides the variant: on a non-success status the body's
/// `error`/`error_description` are surfaced (empty when the body is not the
/// expected JSON), on success the `id_token` field is extracted. Missing fields
/// are empty strings.
///
/// # Errors
///
/// Returns `InvalidResponse` when a success response is not a JSON object.
pub fn parse_token_reply(success: bool, body: &[u8]) -> Result<TokenEndpointReply, ExchangeError> {
    let parsed = serde_json::from_slice::<RawTokenBody>(body);

    if !success {
        let raw = parsed.unwrap_or_default();
        return Ok(TokenEndpointReply::BrokerError {
            code: raw.error,
            description: raw.error_description,
        });
    }

    let raw = parsed.map_err(|e| ExchangeError::InvalidResponse(e.to_string()))?;
    Ok(TokenEndpointReply::BrokerToken {
        id_token: raw.id_token,
    })
}
