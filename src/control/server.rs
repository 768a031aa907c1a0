//! # ControlServer: the live web control surface.
//!
//! Routes:
//! - `GET /` — the controller page
//! - `GET /ws` — viewer socket: accepts `chat`/`controls`/`look` messages,
//!   receives every relayed chat line
//! - `POST /admin` — remote administrative interface (`leave`, `connect`,
//!   `msg`), authorized against the configured admin identity by the
//!   session manager
//!
//! The server runs in a spawned task with token-based graceful shutdown;
//! `close` severs all viewers first so no half-open socket can stall the
//! listener close.

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Json};
use axum::routing::{get, post};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

use crate::error::SessionError;
use crate::gateway::Controls;
use crate::session::{AdminAction, Command};
use crate::teardown::AuxServer;

use super::viewers::ViewerRegistry;

/// Shared state for the axum handlers.
#[derive(Clone)]
struct AppState {
    commands: mpsc::Sender<Command>,
    viewers: Arc<ViewerRegistry>,
}

/// Messages a viewer may send over the socket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ViewerMessage {
    Chat { text: String },
    Controls(Controls),
    Look { dx: f64, dy: f64 },
}

#[derive(Debug, Deserialize)]
struct AdminRequest {
    actor: String,
    command: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
struct AdminResponse {
    ok: bool,
    message: String,
}

/// Control surface bound to the active session.
pub struct ControlServer {
    cancel: CancellationToken,
    join: JoinHandle<()>,
    viewers: Arc<ViewerRegistry>,
}

impl ControlServer {
    /// Binds the listener and starts serving.
    pub async fn bind(
        port: u16,
        commands: mpsc::Sender<Command>,
        viewers: Arc<ViewerRegistry>,
    ) -> std::io::Result<Self> {
        let state = AppState {
            commands,
            viewers: Arc::clone(&viewers),
        };
        let router = Router::new()
            .route("/", get(page_handler))
            .route("/ws", get(ws_handler))
            .route("/admin", post(admin_handler))
            .with_state(state)
            .layer(CorsLayer::permissive());

        let listener = TcpListener::bind(("0.0.0.0", port)).await?;
        let local = listener.local_addr()?;

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let join = tokio::spawn(async move {
            let shutdown = async move { token.cancelled().await };
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(shutdown)
                .await
            {
                warn!(error = %e, "control surface serve failed");
            }
        });

        info!(port = local.port(), "control surface listening");
        Ok(Self {
            cancel,
            join,
            viewers,
        })
    }
}

#[async_trait]
impl AuxServer for ControlServer {
    fn name(&self) -> &'static str {
        "control"
    }

    async fn close(self: Box<Self>) {
        // Sever live clients before the listener: graceful shutdown waits
        // for open connections, and the viewer loops end when their feeds
        // close.
        self.viewers.disconnect_all();
        self.cancel.cancel();
        if let Err(e) = self.join.await {
            if e.is_panic() {
                warn!("control surface task panicked");
            } else {
                debug!(error = %e, "control surface join failed");
            }
        }
    }
}

async fn page_handler() -> Html<&'static str> {
    Html(CONTROL_PAGE)
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_viewer(socket, state))
}

/// One viewer connection: pump the outbound feed and the inbound messages
/// until either side closes or teardown severs the feed.
async fn handle_viewer(socket: WebSocket, state: AppState) {
    let (id, mut feed) = state.viewers.register();
    info!(viewer = id, "control viewer connected");

    let (mut sink, mut stream) = socket.split();
    loop {
        tokio::select! {
            out = feed.recv() => match out {
                Some(line) => {
                    if sink.send(Message::Text(line.into())).await.is_err() {
                        break;
                    }
                }
                // Feed closed: severed by teardown.
                None => break,
            },
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Text(raw))) => {
                    handle_viewer_message(raw.as_str(), &state).await;
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(viewer = id, error = %e, "viewer socket error");
                    break;
                }
            }
        }
    }

    state.viewers.unregister(id);
    // Release any movement keys the viewer was holding.
    let _ = state.commands.send(Command::Controls(Controls::default())).await;
    info!(viewer = id, "control viewer disconnected");
}

async fn handle_viewer_message(raw: &str, state: &AppState) {
    match serde_json::from_str::<ViewerMessage>(raw) {
        Ok(ViewerMessage::Chat { text }) => {
            let text: String = text.chars().take(256).collect();
            let _ = state.commands.send(Command::Chat(text)).await;
        }
        Ok(ViewerMessage::Controls(controls)) => {
            let _ = state.commands.send(Command::Controls(controls)).await;
        }
        Ok(ViewerMessage::Look { dx, dy }) => {
            let _ = state.commands.send(Command::Look { dx, dy }).await;
        }
        Err(e) => debug!(error = %e, "ignoring malformed viewer message"),
    }
}

async fn admin_handler(
    State(state): State<AppState>,
    Json(req): Json<AdminRequest>,
) -> (StatusCode, Json<AdminResponse>) {
    let action = match req.command.as_str() {
        "leave" => AdminAction::Leave,
        "connect" => AdminAction::Connect,
        "msg" => AdminAction::Say(req.text),
        other => {
            return (
                StatusCode::BAD_REQUEST,
                Json(AdminResponse {
                    ok: false,
                    message: format!("unknown command: {other}"),
                }),
            );
        }
    };

    let (tx, rx) = oneshot::channel();
    let cmd = Command::Admin {
        actor: req.actor,
        action,
        reply: tx,
    };
    if state.commands.send(cmd).await.is_err() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(AdminResponse {
                ok: false,
                message: "manager unavailable".to_string(),
            }),
        );
    }

    match rx.await {
        Ok(Ok(message)) => (StatusCode::OK, Json(AdminResponse { ok: true, message })),
        Ok(Err(e)) => {
            let status = match e {
                SessionError::PermissionDenied => StatusCode::FORBIDDEN,
                _ => StatusCode::CONFLICT,
            };
            (
                status,
                Json(AdminResponse {
                    ok: false,
                    message: e.to_string(),
                }),
            )
        }
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(AdminResponse {
                ok: false,
                message: "manager unavailable".to_string(),
            }),
        ),
    }
}

/// Minimal controller page: chat log plus key capture, talking to `/ws`.
const CONTROL_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
<title>botvisor controller</title>
<style>
body{background:#1a1a2e;color:#eee;font-family:monospace;margin:0;padding:1rem}
#chat{height:60vh;overflow-y:auto;background:#111;padding:.5rem;border-radius:4px}
#chat p{margin:.15rem 0;word-wrap:break-word}
#input{width:100%;box-sizing:border-box;margin-top:.5rem;padding:.5rem;background:#222;color:#eee;border:1px solid #444;border-radius:4px}
#hint{color:#888;font-size:.8rem}
</style>
</head>
<body>
<div id="chat"></div>
<input id="input" placeholder="chat message... (WASD/space/shift/ctrl steer while the input is unfocused)" maxlength="256">
<p id="hint">connecting...</p>
<script>
const ws=new WebSocket(`ws://${location.host}/ws`);
const chat=document.getElementById("chat"),input=document.getElementById("input"),hint=document.getElementById("hint");
ws.onopen=()=>hint.textContent="connected";
ws.onclose=()=>hint.textContent="disconnected";
ws.onmessage=e=>{const p=document.createElement("p");p.textContent=e.data;chat.appendChild(p);
while(chat.children.length>200)chat.removeChild(chat.firstChild);chat.scrollTop=chat.scrollHeight};
input.addEventListener("keydown",e=>{if(e.key==="Enter"&&input.value.trim()){
ws.send(JSON.stringify({type:"chat",text:input.value.trim()}));input.value=""}e.stopPropagation()});
const keys={forward:false,back:false,left:false,right:false,jump:false,sneak:false,sprint:false};
const map={KeyW:"forward",KeyS:"back",KeyA:"left",KeyD:"right",Space:"jump",ShiftLeft:"sneak",ControlLeft:"sprint"};
function send(){ws.send(JSON.stringify({type:"controls",...keys}))}
document.addEventListener("keydown",e=>{if(document.activeElement===input)return;
const k=map[e.code];if(k&&!keys[k]){keys[k]=true;send()}});
document.addEventListener("keyup",e=>{if(document.activeElement===input)return;
const k=map[e.code];if(k&&keys[k]){keys[k]=false;send()}});
document.addEventListener("mousemove",e=>{if(document.pointerLockElement===document.body)
ws.send(JSON.stringify({type:"look",dx:e.movementX,dy:e.movementY}))});
document.body.addEventListener("click",e=>{if(e.target!==input)document.body.requestPointerLock()});
</script>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bind_and_close_releases_the_port() {
        let (tx, _rx) = mpsc::channel(8);
        let viewers = Arc::new(ViewerRegistry::new());

        let server = ControlServer::bind(0, tx.clone(), Arc::clone(&viewers))
            .await
            .expect("bind");
        Box::new(server).close().await;

        // A second bind on an ephemeral port must also work after close.
        let server = ControlServer::bind(0, tx, viewers).await.expect("rebind");
        Box::new(server).close().await;
    }

    #[test]
    fn viewer_messages_parse() {
        let msg: ViewerMessage =
            serde_json::from_str(r#"{"type":"chat","text":"hi"}"#).unwrap();
        assert!(matches!(msg, ViewerMessage::Chat { text } if text == "hi"));

        let msg: ViewerMessage =
            serde_json::from_str(r#"{"type":"controls","forward":true,"jump":true}"#).unwrap();
        assert!(matches!(
            msg,
            ViewerMessage::Controls(c) if c.forward && c.jump && !c.back
        ));

        let msg: ViewerMessage =
            serde_json::from_str(r#"{"type":"look","dx":3.5,"dy":-1.0}"#).unwrap();
        assert!(matches!(msg, ViewerMessage::Look { dx, dy } if dx == 3.5 && dy == -1.0));
    }
}
