//! # Session capability seam.
//!
//! The remote wire protocol is not implemented here. A [`Connector`] dials
//! the remote endpoint and returns a [`Gateway`] handle plus a stream of
//! [`GatewayEvent`]s; everything above this seam (lifecycle, behaviors,
//! relays) is transport-agnostic.
//!
//! ## Rules
//! - Events from one connection are delivered in the order the transport
//!   received them.
//! - The event channel closing (or an `Ended` event) means the connection is
//!   gone; the gateway handle tolerates calls after that point by returning
//!   [`GatewayError::Closed`]-class errors rather than panicking.
//! - [`Gateway::snapshot`] is read-mostly shared state: cheap, lock-brief,
//!   safe to call from any task.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::GatewayError;

#[cfg(test)]
pub(crate) mod fake;
mod line;

pub use line::LineConnector;

/// Shared handle to an active gateway.
pub type GatewayRef = Arc<dyn Gateway>;

/// World-space position.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    /// Squared distance to another point (avoids the sqrt for comparisons).
    pub fn distance_sq(&self, other: &Vec3) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }
}

/// Movement control flags, as reported by a control-surface viewer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Controls {
    pub forward: bool,
    pub back: bool,
    pub left: bool,
    pub right: bool,
    pub jump: bool,
    pub sneak: bool,
    pub sprint: bool,
}

/// Phase of the fixed two-phase interact sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractPhase {
    Begin,
    End,
}

/// Connection parameters for [`Connector::connect`].
#[derive(Clone, Debug)]
pub struct Identity {
    pub host: String,
    pub port: u16,
    pub username: String,
}

/// Events emitted by an active gateway, in transport arrival order.
#[derive(Clone, Debug, PartialEq)]
pub enum GatewayEvent {
    /// The session finished entering the world.
    Spawned,
    /// One inbound chat line, verbatim.
    Line(String),
    /// The server expelled the session; an `Ended` event follows.
    Kicked(String),
    /// The connection is gone (any cause).
    Ended(String),
    /// Connection-level fault; not terminal on its own.
    Error(String),
}

/// Read-mostly snapshot of the session's world state.
///
/// Updated by the gateway from inbound state messages; read by behaviors and
/// operator queries. Mutating it has no effect on the remote session.
#[derive(Clone, Debug, Default)]
pub struct ViewState {
    /// Spawn completed.
    pub spawned: bool,
    /// Own position.
    pub position: Vec3,
    /// View direction, radians.
    pub yaw: f64,
    pub pitch: f64,
    /// Health points (0–20).
    pub health: f32,
    /// Food points (0–20).
    pub food: f32,
    /// Known co-present players, with a position when the entity is loaded.
    pub players: BTreeMap<String, Option<Vec3>>,
    /// Nearby interactive markers.
    pub markers: Vec<Vec3>,
}

/// # Handle to one live connection.
///
/// All operations are narrow write paths into the session; the rest of the
/// system treats the session as read-only via [`Gateway::snapshot`].
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Current view of the session's world state.
    fn snapshot(&self) -> ViewState;

    /// Sends a chat line.
    async fn send_chat(&self, text: &str) -> Result<(), GatewayError>;

    /// Replaces the movement control flags.
    async fn set_controls(&self, controls: Controls) -> Result<(), GatewayError>;

    /// Sets the view direction.
    async fn set_look(&self, yaw: f64, pitch: f64) -> Result<(), GatewayError>;

    /// Faces a world-space point.
    async fn look_at(&self, target: Vec3) -> Result<(), GatewayError>;

    /// (Re)issues a movement goal toward the named player at a standoff range.
    async fn follow(&self, target: &str, range: f64) -> Result<(), GatewayError>;

    /// Sends one phase of the two-phase interact sequence at a marker.
    async fn interact(&self, target: Vec3, phase: InteractPhase) -> Result<(), GatewayError>;

    /// Tears the connection down. Best-effort; never fails.
    async fn quit(&self);
}

/// Dials the remote endpoint and produces a live [`Gateway`].
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connects and returns the gateway handle plus its event stream.
    async fn connect(
        &self,
        identity: &Identity,
    ) -> Result<(GatewayRef, mpsc::Receiver<GatewayEvent>), GatewayError>;
}
