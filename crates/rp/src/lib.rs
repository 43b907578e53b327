//! brokerrp - a relying party for identity broker end-to-end tests.
//!
//! Serves a login form on `/`, starts authentication on `/auth` and handles
//! the broker callback on `/verify`. Every callback ends in exactly one
//! outcome event on the instance's [`EventBus`], so tests can observe what
//! happened without scraping pages.

mod app;
pub mod config;
mod error;
mod handlers;
mod server;
mod state;
mod templates;

pub use app::create_app;
pub use config::Config;
pub use error::RpError;
pub use server::RelyingParty;
pub use state::AppState;

pub use brokerrp_core::rp::{
    BrokerClient, CallbackParams, EventBus, EventKind, ListenerId, RpEvent, TokenExchanger,
};
