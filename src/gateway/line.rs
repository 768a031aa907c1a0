//! # Line-envelope gateway.
//!
//! Thin adapter speaking a line-delimited JSON envelope over TCP to a
//! protocol sidecar that owns the real wire protocol: one serde-tagged
//! object per line in each direction, framed with [`LinesCodec`].
//!
//! Inbound lines either update the shared [`ViewState`] (`state`, `players`,
//! `markers`) or surface as [`GatewayEvent`]s (`spawn`, `chat`, `kicked`).
//! EOF or a read error on the stream yields a final `Ended` event.
//! Malformed inbound lines are logged and skipped; they are not fatal.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use futures::{SinkExt, StreamExt, stream::SplitSink};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc};
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{debug, warn};

use crate::error::GatewayError;

use super::{
    Connector, Controls, Gateway, GatewayEvent, GatewayRef, Identity, InteractPhase, Vec3,
    ViewState,
};

/// Upper bound on one envelope line.
const MAX_LINE: usize = 64 * 1024;
/// Event channel depth toward the session manager.
const EVENT_QUEUE: usize = 64;

/// Messages received from the sidecar.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerMessage {
    Spawn,
    Chat { text: String },
    Kicked { reason: String },
    State {
        position: Vec3,
        #[serde(default)]
        yaw: f64,
        #[serde(default)]
        pitch: f64,
        health: f32,
        food: f32,
    },
    Players { players: Vec<PlayerEntry> },
    Markers { markers: Vec<Vec3> },
}

#[derive(Debug, Deserialize)]
struct PlayerEntry {
    name: String,
    #[serde(default)]
    position: Option<Vec3>,
}

/// Messages sent to the sidecar.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage<'a> {
    Join { username: &'a str },
    Chat { text: &'a str },
    Controls { controls: Controls },
    Look { yaw: f64, pitch: f64 },
    LookAt { target: Vec3 },
    Follow { target: &'a str, range: f64 },
    Interact { target: Vec3, phase: InteractPhase },
    Quit,
}

/// [`Connector`] for the line-envelope transport.
pub struct LineConnector;

#[async_trait]
impl Connector for LineConnector {
    async fn connect(
        &self,
        identity: &Identity,
    ) -> Result<(GatewayRef, mpsc::Receiver<GatewayEvent>), GatewayError> {
        let stream = TcpStream::connect((identity.host.as_str(), identity.port))
            .await
            .map_err(|e| GatewayError::Connect(e.to_string()))?;
        let framed = Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE));
        let (sink, source) = framed.split();

        let view = Arc::new(RwLock::new(ViewState::default()));
        let (ev_tx, ev_rx) = mpsc::channel(EVENT_QUEUE);
        tokio::spawn(read_loop(source, Arc::clone(&view), ev_tx));

        let gateway = LineGateway {
            out: Mutex::new(sink),
            view,
        };
        gateway
            .send(&ClientMessage::Join {
                username: &identity.username,
            })
            .await?;

        Ok((Arc::new(gateway), ev_rx))
    }
}

type LineSink = SplitSink<Framed<TcpStream, LinesCodec>, String>;

/// Live connection over the line-envelope transport.
struct LineGateway {
    out: Mutex<LineSink>,
    view: Arc<RwLock<ViewState>>,
}

impl LineGateway {
    async fn send(&self, msg: &ClientMessage<'_>) -> Result<(), GatewayError> {
        let line =
            serde_json::to_string(msg).map_err(|e| GatewayError::Envelope(e.to_string()))?;
        self.out
            .lock()
            .await
            .send(line)
            .await
            .map_err(|e| GatewayError::Envelope(e.to_string()))
    }
}

#[async_trait]
impl Gateway for LineGateway {
    fn snapshot(&self) -> ViewState {
        self.view.read().map(|v| v.clone()).unwrap_or_default()
    }

    async fn send_chat(&self, text: &str) -> Result<(), GatewayError> {
        self.send(&ClientMessage::Chat { text }).await
    }

    async fn set_controls(&self, controls: Controls) -> Result<(), GatewayError> {
        self.send(&ClientMessage::Controls { controls }).await
    }

    async fn set_look(&self, yaw: f64, pitch: f64) -> Result<(), GatewayError> {
        self.send(&ClientMessage::Look { yaw, pitch }).await
    }

    async fn look_at(&self, target: Vec3) -> Result<(), GatewayError> {
        self.send(&ClientMessage::LookAt { target }).await
    }

    async fn follow(&self, target: &str, range: f64) -> Result<(), GatewayError> {
        self.send(&ClientMessage::Follow { target, range }).await
    }

    async fn interact(&self, target: Vec3, phase: InteractPhase) -> Result<(), GatewayError> {
        self.send(&ClientMessage::Interact { target, phase }).await
    }

    async fn quit(&self) {
        if let Err(e) = self.send(&ClientMessage::Quit).await {
            debug!(error = %e, "quit send failed (connection likely gone)");
        }
        if let Err(e) = self.out.lock().await.close().await {
            debug!(error = %e, "sink close failed");
        }
    }
}

/// Drains the inbound stream until EOF, updating the view and forwarding
/// session events. Always terminates with an `Ended` event.
async fn read_loop(
    mut source: futures::stream::SplitStream<Framed<TcpStream, LinesCodec>>,
    view: Arc<RwLock<ViewState>>,
    events: mpsc::Sender<GatewayEvent>,
) {
    let reason = loop {
        match source.next().await {
            Some(Ok(raw)) => {
                let msg: ServerMessage = match serde_json::from_str(&raw) {
                    Ok(m) => m,
                    Err(e) => {
                        warn!(error = %e, "skipping malformed envelope line");
                        continue;
                    }
                };
                if let Some(ev) = apply(&view, msg) {
                    if events.send(ev).await.is_err() {
                        // Receiver gone: the manager already discarded us.
                        return;
                    }
                }
            }
            Some(Err(e)) => break e.to_string(),
            None => break "connection closed".to_string(),
        }
    };
    let _ = events.send(GatewayEvent::Ended(reason)).await;
}

/// Applies one inbound message: view updates return `None`, session events
/// are passed through.
fn apply(view: &RwLock<ViewState>, msg: ServerMessage) -> Option<GatewayEvent> {
    match msg {
        ServerMessage::Spawn => {
            if let Ok(mut v) = view.write() {
                v.spawned = true;
            }
            Some(GatewayEvent::Spawned)
        }
        ServerMessage::Chat { text } => Some(GatewayEvent::Line(text)),
        ServerMessage::Kicked { reason } => Some(GatewayEvent::Kicked(reason)),
        ServerMessage::State {
            position,
            yaw,
            pitch,
            health,
            food,
        } => {
            if let Ok(mut v) = view.write() {
                v.position = position;
                v.yaw = yaw;
                v.pitch = pitch;
                v.health = health;
                v.food = food;
            }
            None
        }
        ServerMessage::Players { players } => {
            if let Ok(mut v) = view.write() {
                v.players = players.into_iter().map(|p| (p.name, p.position)).collect();
            }
            None
        }
        ServerMessage::Markers { markers } => {
            if let Ok(mut v) = view.write() {
                v.markers = markers;
            }
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_chat_becomes_a_line_event() {
        let view = RwLock::new(ViewState::default());
        let msg: ServerMessage = serde_json::from_str(r#"{"type":"chat","text":"hi"}"#).unwrap();
        assert_eq!(apply(&view, msg), Some(GatewayEvent::Line("hi".into())));
    }

    #[test]
    fn state_updates_view_without_an_event() {
        let view = RwLock::new(ViewState::default());
        let msg: ServerMessage = serde_json::from_str(
            r#"{"type":"state","position":{"x":1.0,"y":64.0,"z":-3.5},"health":18.0,"food":20.0}"#,
        )
        .unwrap();
        assert_eq!(apply(&view, msg), None);
        let v = view.read().unwrap();
        assert_eq!(v.position, Vec3 { x: 1.0, y: 64.0, z: -3.5 });
        assert_eq!(v.health, 18.0);
    }

    #[test]
    fn players_replace_the_roster() {
        let view = RwLock::new(ViewState::default());
        let msg: ServerMessage = serde_json::from_str(
            r#"{"type":"players","players":[{"name":"ada"},{"name":"brin","position":{"x":0.0,"y":0.0,"z":0.0}}]}"#,
        )
        .unwrap();
        assert_eq!(apply(&view, msg), None);
        let v = view.read().unwrap();
        assert_eq!(v.players.len(), 2);
        assert!(v.players["ada"].is_none());
        assert!(v.players["brin"].is_some());
    }

    #[test]
    fn outbound_messages_are_tagged() {
        let line = serde_json::to_string(&ClientMessage::Follow {
            target: "ada",
            range: 2.0,
        })
        .unwrap();
        assert_eq!(line, r#"{"type":"follow","target":"ada","range":2.0}"#);
    }
}
