//! Single-use nonce storage shared by the broker clients.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::{sync::RwLock, task::JoinHandle};

/// How often the background task drops expired nonces.
pub const PURGE_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60);

/// In-memory nonce store.
///
/// Nonces are issued when authentication starts and redeemed once when the
/// resulting token is verified.
#[derive(Debug, Clone, Default)]
pub struct NonceStore {
    nonces: Arc<RwLock<HashMap<String, DateTime<Utc>>>>,
}

impl NonceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember `nonce` until `now + ttl`.
    pub async fn insert(&self, nonce: &str, now: DateTime<Utc>, ttl: Duration) {
        let mut nonces = self.nonces.write().await;
        nonces.insert(nonce.to_string(), now + ttl);
    }

    /// Redeem a nonce. Returns `false` if it is unknown, already used or expired.
    pub async fn take(&self, nonce: &str, now: DateTime<Utc>) -> bool {
        let mut nonces = self.nonces.write().await;
        matches!(nonces.remove(nonce), Some(expires_at) if expires_at > now)
    }

    /// Drop expired nonces and return how many were removed.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut nonces = self.nonces.write().await;
        let before = nonces.len();
        nonces.retain(|_, expires_at| *expires_at > now);
        before - nonces.len()
    }

    pub async fn clear(&self) {
        self.nonces.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.nonces.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.nonces.read().await.is_empty()
    }
}

/// Spawn a task that periodically purges expired nonces from `store`.
///
/// The task runs until it is aborted.
pub fn spawn_purge_task(store: NonceStore, period: std::time::Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let purged = store.purge_expired(Utc::now()).await;
            if purged > 0 {
                tracing::debug!(purged, "Purged expired nonces");
            }
        }
    })
}
