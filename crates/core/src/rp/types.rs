use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// Parameters the broker sends back to the redirect URI.
///
/// Absent fields are the empty string. Keys we don't interpret (such as
/// `state`) are kept in `extra` so listeners see the full callback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub error_description: String,
    #[serde(default)]
    pub id_token: String,
    #[serde(default)]
    pub code: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl CallbackParams {
    /// Builds parameters from a flat key/value map.
    pub fn from_map(mut map: HashMap<String, String>) -> Self {
        let mut take = |key: &str| map.remove(key).unwrap_or_default();
        let error = take("error");
        let error_description = take("error_description");
        let id_token = take("id_token");
        let code = take("code");

        Self {
            error,
            error_description,
            id_token,
            code,
            extra: map.into_iter().collect(),
        }
    }

    /// Picks the parameter source for a callback.
    ///
    /// The form body wins when it carries at least one field; otherwise the
    /// query string is used.
    pub fn merge(body: HashMap<String, String>, query: HashMap<String, String>) -> Self {
        if body.is_empty() {
            Self::from_map(query)
        } else {
            Self::from_map(body)
        }
    }

    /// Classifies the callback. Checks run in a fixed order and the first
    /// match wins, so a malformed callback carrying several signals is still
    /// handled deterministically.
    pub fn signal(&self) -> CallbackSignal {
        if !self.error.is_empty() {
            return CallbackSignal::BrokerError {
                error: self.error.clone(),
                description: self.error_description.clone(),
            };
        }
        if !self.id_token.is_empty() {
            return CallbackSignal::ImplicitToken(self.id_token.clone());
        }
        if !self.code.is_empty() {
            return CallbackSignal::AuthorizationCode(self.code.clone());
        }
        CallbackSignal::Empty
    }
}

/// What a callback asks the relying party to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackSignal {
    /// The broker reported a failure.
    BrokerError { error: String, description: String },
    /// Implicit flow: the ID token is in the callback.
    ImplicitToken(String),
    /// Code flow: the code must be exchanged at the token endpoint.
    AuthorizationCode(String),
    /// None of the above; verification runs against an empty token.
    Empty,
}

/// A successful code exchange. `id_token` is empty when the endpoint
/// omitted it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenGrant {
    pub id_token: String,
}

/// Parsed token endpoint reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenEndpointReply {
    BrokerError { code: String, description: String },
    BrokerToken { id_token: String },
}

impl TokenEndpointReply {
    /// Converts the reply into the exchange result seen by callers.
    pub fn into_grant(self) -> Result<TokenGrant, crate::rp::ExchangeError> {
        match self {
            Self::BrokerError { code, description } => {
                Err(crate::rp::ExchangeError::Endpoint {
                    error: code,
                    description,
                })
            }
            Self::BrokerToken { id_token } => Ok(TokenGrant { id_token }),
        }
    }
}
