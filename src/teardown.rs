//! # Resource teardown coordinator.
//!
//! [`Teardown`] owns the auxiliary servers bound to the active session and
//! closes them all before a replacement session may start listeners on the
//! same ports.
//!
//! ## Rules
//! - Closes run concurrently; each server severs its own clients before
//!   releasing the listening socket.
//! - An individual close failure is logged by the server and treated as
//!   closed; it never blocks the others.
//! - `close_all()` resolves when every close finishes **or** after the force
//!   timeout, whichever comes first — a misbehaving server cannot block
//!   reconnection indefinitely.
//! - Calling with nothing registered (or calling twice) is a no-op.

use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, warn};

/// Upper bound on the whole teardown pass.
pub const FORCE_CLOSE_TIMEOUT: Duration = Duration::from_secs(3);

/// An auxiliary listening endpoint bound to the active session.
#[async_trait]
pub trait AuxServer: Send + Sync {
    /// Stable server name for logs.
    fn name(&self) -> &'static str;

    /// Severs live clients, then releases the listening socket. Failures are
    /// logged internally; the server counts as closed either way.
    async fn close(self: Box<Self>);
}

/// Collection of auxiliary servers with a bounded close-all.
pub struct Teardown {
    servers: Vec<Box<dyn AuxServer>>,
    force: Duration,
}

impl Default for Teardown {
    fn default() -> Self {
        Self::new()
    }
}

impl Teardown {
    pub fn new() -> Self {
        Self {
            servers: Vec::new(),
            force: FORCE_CLOSE_TIMEOUT,
        }
    }

    #[cfg(test)]
    fn with_force(force: Duration) -> Self {
        Self {
            servers: Vec::new(),
            force,
        }
    }

    /// Registers a server for the next `close_all` pass.
    pub fn push(&mut self, server: Box<dyn AuxServer>) {
        self.servers.push(server);
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// Closes every registered server, bounded by the force timeout.
    pub async fn close_all(&mut self) {
        let servers = std::mem::take(&mut self.servers);
        if servers.is_empty() {
            return;
        }

        let closes = servers.into_iter().map(|s| {
            let name = s.name();
            async move {
                s.close().await;
                debug!(server = name, "auxiliary server closed");
            }
        });

        match tokio::time::timeout(self.force, join_all(closes)).await {
            Ok(_) => debug!("teardown complete"),
            Err(_) => warn!(
                timeout = ?self.force,
                "teardown force timeout hit, abandoning stuck closes"
            ),
        }
    }
}
