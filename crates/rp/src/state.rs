//! Shared state handed to every request handler.

use std::{sync::Arc, time::Duration};

use brokerrp_core::rp::{BrokerClient, EventBus, TokenExchanger};

/// Request timeout used when none is configured. Stays above the default
/// outbound timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Collaborators of one relying party instance.
///
/// Holds no per-request data: everything a callback needs arrives with the
/// callback itself.
#[derive(Clone)]
pub struct AppState {
    pub broker: Arc<dyn BrokerClient>,
    pub exchanger: Arc<dyn TokenExchanger>,
    pub events: EventBus,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(broker: Arc<dyn BrokerClient>, exchanger: Arc<dyn TokenExchanger>) -> Self {
        Self {
            broker,
            exchanger,
            events: EventBus::new(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Bound every request by `timeout` instead of the default.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}
