//! Mock identity broker for development and end-to-end tests.
//!
//! Serves an authorization endpoint that asks for confirmation and then
//! delivers the callback (implicit token, authorization code or error), plus
//! a token endpoint for the code flow. Tokens are HS256 JWTs signed with a
//! shared secret so [`crate::MockBroker`] can verify them.

mod server;
mod templates;
pub(crate) mod tokens;

pub use server::{MockBrokerHandle, MockBrokerServer};
