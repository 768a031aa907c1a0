//! Commands accepted by the [`SessionManager`](super::SessionManager).
//!
//! Every input surface (operator console, control surface viewers, the admin
//! endpoint, behaviors, internal timers) reduces to one of these messages;
//! the manager is the only task that touches session state. Queries carry a
//! oneshot reply channel; fire-and-forget senders tolerate a dropped reply.

use tokio::sync::oneshot;

use crate::error::SessionError;
use crate::gateway::{Controls, Vec3};

/// Message to the session manager.
pub enum Command {
    /// Operator/admin connect request. Rejected while a session exists or a
    /// connect is already pending.
    Connect {
        reply: Option<oneshot::Sender<Result<(), SessionError>>>,
    },
    /// Operator/admin disconnect; suppresses auto-reconnect.
    Leave {
        reply: Option<oneshot::Sender<Result<(), SessionError>>>,
    },
    /// Send a chat line to the session.
    Chat(String),
    /// Replace the movement control flags (control surface).
    Controls(Controls),
    /// Relative look from a viewer's pointer movement (control surface).
    Look { dx: f64, dy: f64 },
    /// Connection status snapshot.
    Status {
        reply: oneshot::Sender<StatusReport>,
    },
    /// Other online players; `None` without an active session.
    Players {
        reply: oneshot::Sender<Option<Vec<String>>>,
    },
    /// Current coordinates; `None` without an active session.
    Coords {
        reply: oneshot::Sender<Option<Vec3>>,
    },
    /// Remote administrative command, authorized against the configured
    /// admin identity.
    Admin {
        actor: String,
        action: AdminAction,
        reply: oneshot::Sender<Result<String, SessionError>>,
    },
    /// Scheduled restart (from the restart behavior).
    Restart,
    /// Internal: dial now. Sent by the reconnect and connect-settle timers;
    /// ignored while a session exists.
    Reconnect,
    /// Stop the manager loop (process shutdown).
    Shutdown,
}

/// Actions available on the remote administrative interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminAction {
    Leave,
    Connect,
    Say(String),
}

/// Reply to [`Command::Status`].
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub connected: bool,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub health: f32,
    pub food: f32,
}
