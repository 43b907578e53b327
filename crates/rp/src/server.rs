//! Relying party lifecycle.

use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::Duration,
};

use brokerrp_core::rp::{BrokerClient, EventBus, EventKind, ListenerId, RpEvent, TokenExchanger};
use tokio::{net::TcpListener, sync::oneshot, task::JoinHandle};

use crate::{app::create_app, config::Config, error::RpError, state::AppState};

/// How long `destroy` waits for in-flight requests before dropping them.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// A running relying party.
///
/// Owns its broker client and its event bus. Listeners registered through
/// [`RelyingParty::on`] or [`RelyingParty::events`] see every `/verify`
/// outcome of this instance and of no other.
pub struct RelyingParty {
    addr: SocketAddr,
    events: EventBus,
    broker: Arc<dyn BrokerClient>,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
    task: Mutex<Option<JoinHandle<()>>>,
    destroyed: AtomicBool,
}

impl RelyingParty {
    /// Bind to `config.bind_addr()` and start serving.
    ///
    /// # Errors
    ///
    /// Returns `RpError::Io` if the address cannot be bound.
    pub async fn start(
        config: &Config,
        broker: Arc<dyn BrokerClient>,
        exchanger: Arc<dyn TokenExchanger>,
    ) -> Result<Self, RpError> {
        let listener = TcpListener::bind(config.bind_addr()).await?;
        let state =
            AppState::new(broker, exchanger).with_request_timeout(config.request_timeout());
        Self::launch(listener, state)
    }

    /// Start serving on an already bound listener.
    ///
    /// Useful when the redirect URI has to name the port before the broker
    /// client can be built. Requests get the default request timeout.
    pub fn serve(
        listener: TcpListener,
        broker: Arc<dyn BrokerClient>,
        exchanger: Arc<dyn TokenExchanger>,
    ) -> Result<Self, RpError> {
        Self::launch(listener, AppState::new(broker, exchanger))
    }

    fn launch(listener: TcpListener, state: AppState) -> Result<Self, RpError> {
        let addr = listener.local_addr()?;
        let broker = state.broker.clone();
        let events = state.events.clone();
        let app = create_app(state);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = result {
                tracing::error!(error = %e, "RP server stopped with an error");
            }
        });

        tracing::info!(%addr, "RP listening");

        Ok(Self {
            addr,
            events,
            broker,
            shutdown: Mutex::new(Some(shutdown_tx)),
            task: Mutex::new(Some(task)),
            destroyed: AtomicBool::new(false),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Origin of this instance, e.g. `http://127.0.0.1:44180`.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Register a listener for outcome events of `kind`.
    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&RpEvent) + Send + Sync + 'static,
    {
        self.events.on(kind, listener)
    }

    /// Stop accepting connections and release the broker client.
    ///
    /// Only the first call does anything; later calls return immediately
    /// and emit nothing. Requests still running after a short grace period
    /// are dropped.
    pub async fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }

        let shutdown = self
            .shutdown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(tx) = shutdown {
            let _ = tx.send(());
        }

        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(mut task) = task {
            if tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await.is_err() {
                tracing::warn!("RP server did not drain in time, aborting");
                task.abort();
            }
        }

        self.broker.destroy().await;

        tracing::info!(addr = %self.addr, "RP destroyed");
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }
}

impl Drop for RelyingParty {
    fn drop(&mut self) {
        // Without a destroy() the server task would outlive its owner.
        let task = self
            .task
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
        }
    }
}
