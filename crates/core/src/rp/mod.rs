mod error;
mod events;
mod functions;
mod traits;
mod types;
mod verify;

pub use error::{BrokerError, ExchangeError};
pub use events::{EventBus, EventKind, Listener, ListenerId, RpEvent};
pub use functions::{generate_nonce, parse_token_reply, token_request_form};
pub use traits::{BrokerClient, Result, TokenExchanger};
pub use types::{CallbackParams, CallbackSignal, TokenEndpointReply, TokenGrant};
pub use verify::{verify_callback, VerifyOutcome};
