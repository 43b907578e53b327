//! Token and code formats shared by the mock broker and `MockBroker`.

use base64::Engine;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Signing secret for mock ID tokens. Development only.
const MOCK_SIGNING_SECRET: &[u8] = b"brokerrp-mock-broker-secret";

/// Lifetime of an issued mock ID token.
const TOKEN_TTL_SECS: i64 = 10 * 60;

/// Claims carried by a mock ID token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MockClaims {
    pub iss: String,
    pub aud: String,
    pub sub: String,
    pub email: String,
    pub nonce: String,
    pub iat: i64,
    pub exp: i64,
}

/// Contents of a mock authorization code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MockCode {
    pub email: String,
    pub nonce: String,
    pub client_id: String,
    pub redirect_uri: String,
}

/// Sign an ID token for `email` addressed to `audience`.
pub fn issue_id_token(
    issuer: &str,
    audience: &str,
    email: &str,
    nonce: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = chrono::Utc::now().timestamp();
    let claims = MockClaims {
        iss: issuer.to_string(),
        aud: audience.to_string(),
        sub: email.to_string(),
        email: email.to_string(),
        nonce: nonce.to_string(),
        iat: now,
        exp: now + TOKEN_TTL_SECS,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(MOCK_SIGNING_SECRET),
    )
}

/// Check signature, issuer, audience and expiry of a mock ID token.
pub fn decode_id_token(
    token: &str,
    issuer: &str,
    audience: &str,
) -> Result<MockClaims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[issuer]);
    validation.set_audience(&[audience]);

    decode::<MockClaims>(
        token,
        &DecodingKey::from_secret(MOCK_SIGNING_SECRET),
        &validation,
    )
    .map(|data| data.claims)
}

/// Encode a code as URL-safe base64 JSON.
pub fn encode_code(code: &MockCode) -> String {
    let json = serde_json::to_vec(code).unwrap_or_default();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(json)
}

/// Decode a code produced by [`encode_code`].
pub fn decode_code(code: &str) -> Option<MockCode> {
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(code)
        .ok()?;
    serde_json::from_slice(&bytes).ok()
}
