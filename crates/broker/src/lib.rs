//! Identity broker collaborators for brokerrp.
//!
//! This crate provides:
//! - `PortierBroker`, a broker client speaking OIDC to a Portier broker
//! - `HttpTokenExchanger` for the authorization code flow
//! - A mock broker server and matching client (feature `mock`)

mod config;
mod exchanger;
mod nonces;
mod providers;

pub use config::{BrokerConfig, DEFAULT_HTTP_TIMEOUT, DEFAULT_NONCE_TTL};
pub use exchanger::HttpTokenExchanger;
#[cfg(feature = "mock")]
pub use providers::{MockBroker, MockFlow, MockResponseMode};
pub use providers::PortierBroker;

#[cfg(feature = "mock")]
pub mod mock_broker;
