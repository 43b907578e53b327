//! Broker client implementations.
//!
//! This module contains implementations of `BrokerClient` for:
//! - Portier-style brokers (OIDC discovery, implicit flow)
//! - The mock broker (feature `mock`)

#[cfg(feature = "mock")]
mod mock;
mod portier;

#[cfg(feature = "mock")]
pub use mock::{MockBroker, MockFlow, MockResponseMode};
pub use portier::PortierBroker;
