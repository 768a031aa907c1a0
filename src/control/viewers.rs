//! # ViewerRegistry: live control-surface clients.
//!
//! Each connected viewer gets a bounded send queue; broadcast never blocks
//! and drops (with a warning) for a viewer whose queue is full.
//! `disconnect_all` severs every client at once — the teardown coordinator
//! calls it before the listening socket closes, so no half-open viewer
//! socket can stall the close.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tracing::warn;

/// Outbound queue depth per viewer.
const SEND_QUEUE: usize = 64;

/// Registry of connected viewers keyed by connection id.
#[derive(Default)]
pub struct ViewerRegistry {
    viewers: Mutex<HashMap<u64, mpsc::Sender<String>>>,
    next_id: AtomicU64,
}

impl ViewerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new viewer; returns its id and the outbound feed.
    pub(crate) fn register(&self) -> (u64, mpsc::Receiver<String>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(SEND_QUEUE);
        let _ = self.viewers.lock().unwrap().insert(id, tx);
        (id, rx)
    }

    /// Removes one viewer (idempotent).
    pub(crate) fn unregister(&self, id: u64) {
        let _ = self.viewers.lock().unwrap().remove(&id);
    }

    /// Sends a line to every connected viewer, dropping per-viewer on a full
    /// queue.
    pub fn broadcast(&self, line: &str) {
        let viewers = self.viewers.lock().unwrap();
        for (id, tx) in viewers.iter() {
            match tx.try_send(line.to_string()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(viewer = id, "viewer queue full, line dropped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        }
    }

    /// Severs every viewer: their feeds close, which ends their socket
    /// loops.
    pub fn disconnect_all(&self) {
        self.viewers.lock().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.viewers.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn broadcast_reaches_every_viewer() {
        let registry = ViewerRegistry::new();
        let (_a, mut rx_a) = registry.register();
        let (_b, mut rx_b) = registry.register();

        registry.broadcast("hello");
        assert_eq!(rx_a.recv().await.as_deref(), Some("hello"));
        assert_eq!(rx_b.recv().await.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn disconnect_all_closes_every_feed() {
        let registry = ViewerRegistry::new();
        let (_a, mut rx_a) = registry.register();
        let (_b, mut rx_b) = registry.register();

        registry.disconnect_all();
        assert!(rx_a.recv().await.is_none());
        assert!(rx_b.recv().await.is_none());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn unregister_is_idempotent() {
        let registry = ViewerRegistry::new();
        let (id, _rx) = registry.register();
        registry.unregister(id);
        registry.unregister(id);
        assert!(registry.is_empty());
    }
}
