//! Static asset/viewer server on its own port.
//!
//! Serves the read-only viewer page the control surface links to. Same
//! spawn/close discipline as the control server, without viewer state.

use async_trait::async_trait;
use axum::Router;
use axum::response::Html;
use axum::routing::get;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

use crate::teardown::AuxServer;

/// Asset server bound to the active session.
pub struct AssetServer {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl AssetServer {
    /// Binds the listener and starts serving.
    pub async fn bind(port: u16) -> std::io::Result<Self> {
        let router = Router::new()
            .route("/", get(|| async { Html(VIEWER_PAGE) }))
            .route("/health", get(|| async { "ok" }))
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
                warn!(error = %e, "asset server serve failed");
            }
        });

        info!(port = local.port(), "asset server listening");
        Ok(Self { cancel, join })
    }
}

#[async_trait]
impl AuxServer for AssetServer {
    fn name(&self) -> &'static str {
        "assets"
    }

    async fn close(self: Box<Self>) {
        self.cancel.cancel();
        if let Err(e) = self.join.await {
            if e.is_panic() {
                warn!("asset server task panicked");
            } else {
                debug!(error = %e, "asset server join failed");
            }
        }
    }
}

const VIEWER_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>botvisor viewer</title>
<style>body{background:#111;color:#eee;font-family:monospace;display:flex;align-items:center;justify-content:center;height:100vh;margin:0}</style>
</head>
<body><p>botvisor viewer &mdash; session feed is on the controller page</p></body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bind_and_close() {
        let server = AssetServer::bind(0).await.expect("bind");
        Box::new(server).close().await;
    }
}
