//! # Notification channel.
//!
//! [`Notify`] is best-effort by contract: `send` queues a message and
//! returns immediately; delivery failures are logged, never fatal, and never
//! reach the session lifecycle.
//!
//! [`WebhookNotifier`] drains its queue with a single worker doing
//! sequential HTTP posts, so multi-message blocks (roster reports) arrive in
//! the order they were queued. When the queue is full the message is dropped
//! with a warning rather than blocking the caller.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Queue depth for the webhook worker.
const QUEUE_DEPTH: usize = 256;

/// Best-effort text sink.
pub trait Notify: Send + Sync {
    /// Queues one message. Never blocks, never fails the caller.
    fn send(&self, text: &str);
}

/// Sink for a disabled channel.
pub struct NullNotifier;

impl Notify for NullNotifier {
    fn send(&self, _text: &str) {}
}

/// Webhook-backed channel: POSTs `{"content": text}` to the configured URL.
pub struct WebhookNotifier {
    tx: mpsc::Sender<String>,
}

impl WebhookNotifier {
    /// Creates the notifier and spawns its delivery worker.
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        tokio::spawn(deliver(url, rx));
        Self { tx }
    }
}

impl Notify for WebhookNotifier {
    fn send(&self, text: &str) {
        match self.tx.try_send(text.to_string()) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("notification dropped: queue full");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("notification dropped: worker closed");
            }
        }
    }
}

/// Builds the sink for a configured channel URL (empty = disabled).
pub fn from_url(url: &str) -> Arc<dyn Notify> {
    if url.is_empty() {
        Arc::new(NullNotifier)
    } else {
        Arc::new(WebhookNotifier::new(url))
    }
}

/// Sequential delivery loop; one in-flight request at a time.
async fn deliver(url: String, mut rx: mpsc::Receiver<String>) {
    let client = reqwest::Client::new();
    while let Some(text) = rx.recv().await {
        let body = serde_json::json!({ "content": text });
        match client.post(url.as_str()).json(&body).send().await {
            Ok(resp) if resp.status().is_success() => {
                debug!(len = text.len(), "notification delivered");
            }
            Ok(resp) => warn!(status = %resp.status(), "notification rejected"),
            Err(e) => warn!(error = %e, "notification delivery failed"),
        }
    }
}

#[cfg(test)]
pub(crate) mod recording {
    use super::Notify;
    use std::sync::Mutex;

    /// Test sink that records every message in order.
    #[derive(Default)]
    pub(crate) struct RecordingNotifier {
        pub messages: Mutex<Vec<String>>,
    }

    impl RecordingNotifier {
        pub(crate) fn lines(&self) -> Vec<String> {
            self.messages.lock().unwrap().clone()
        }
    }

    impl Notify for RecordingNotifier {
        fn send(&self, text: &str) {
            self.messages.lock().unwrap().push(text.to_string());
        }
    }
}
