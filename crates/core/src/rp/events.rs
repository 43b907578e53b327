//! Outcome events and the per-instance event bus.
//!
//! `emit` is synchronous and returns how many listeners saw the event. Callers
//! use a zero count to decide that nobody handled a failure and a diagnostic
//! has to be logged instead.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, PoisonError, RwLock,
};

use tokio::sync::mpsc;

use super::CallbackParams;

/// Names of the events a relying party emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    GotError,
    InvalidToken,
    Verified,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GotError => write!(f, "gotError"),
            Self::InvalidToken => write!(f, "invalidToken"),
            Self::Verified => write!(f, "verified"),
        }
    }
}

/// An outcome of a `/verify` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpEvent {
    /// The broker or the token endpoint reported an error.
    GotError(CallbackParams),
    /// Token verification failed.
    InvalidToken(CallbackParams),
    /// Verification succeeded for this identity.
    Verified(String),
}

impl RpEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::GotError(_) => EventKind::GotError,
            Self::InvalidToken(_) => EventKind::InvalidToken,
            Self::Verified(_) => EventKind::Verified,
        }
    }
}

/// Event handler.
pub type Listener = Arc<dyn Fn(&RpEvent) + Send + Sync>;

/// Handle returned by [`EventBus::on`], used to remove the listener again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Registration {
    id: ListenerId,
    kind: EventKind,
    listener: Listener,
}

#[derive(Default)]
struct Inner {
    next_id: AtomicU64,
    listeners: RwLock<Vec<Registration>>,
}

/// Synchronous publish/subscribe bus for [`RpEvent`]s.
///
/// Cloning is cheap; clones share the same listener table.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Inner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for events of `kind`.
    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&RpEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Registration {
                id,
                kind,
                listener: Arc::new(listener),
            });
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut listeners = self
            .inner
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|r| r.id != id);
        listeners.len() != before
    }

    /// Register a listener that forwards events of `kind` into a channel.
    ///
    /// The listener stays registered (and keeps counting as a handler) until
    /// it is removed with [`EventBus::off`].
    pub fn subscribe(&self, kind: EventKind) -> (ListenerId, mpsc::UnboundedReceiver<RpEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.on(kind, move |event| {
            // A dropped receiver just means the test stopped listening.
            let _ = tx.send(event.clone());
        });
        (id, rx)
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.inner
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| r.kind == kind)
            .count()
    }

    /// Deliver `event` to every listener of its kind and return how many
    /// were called.
    pub fn emit(&self, event: RpEvent) -> usize {
        let kind = event.kind();

        // Snapshot so listeners can call back into the bus.
        let targets: Vec<Listener> = self
            .inner
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| r.kind == kind)
            .map(|r| r.listener.clone())
            .collect();

        for listener in &targets {
            listener(&event);
        }

        tracing::debug!(event = %kind, listeners = targets.len(), "Emitted event");
        targets.len()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self
            .inner
            .listeners
            .read()
            .map(|l| l.len())
            .unwrap_or_default();
        f.debug_struct("EventBus").field("listeners", &count).finish()
    }
}
