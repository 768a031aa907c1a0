//! Chat reactions: echo a matched trigger phrase back, probabilistically.
//!
//! The trigger matcher is a pure function; the listener task subscribes to
//! the bus for the session's lifetime and is cancelled with the other
//! timers. The probabilistic skip and the randomized delay are intentional
//! jitter, kept from the original behavior.

use std::sync::LazyLock;
use std::time::Duration;

use rand::Rng;
use regex::Regex;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::events::Event;
use crate::gateway::GatewayRef;

pub(crate) const NAME: &str = "reactions";

/// Marker every reaction announcement carries.
const MARKER: &str = "Chat Reaction";
/// Chance of echoing a matched phrase.
const ECHO_CHANCE: f64 = 0.2;
/// Echo delay: floor plus a random spread.
const ECHO_DELAY_FLOOR: Duration = Duration::from_secs(1);
const ECHO_DELAY_SPREAD_MS: u64 = 2000;

static TRIGGER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"type "(.+?)""#).expect("trigger pattern"));

/// Extracts the phrase to type from a reaction announcement.
///
/// Result lines ("No one typed…", "… was first") are not announcements and
/// never match.
pub(crate) fn extract_trigger(line: &str) -> Option<&str> {
    if !line.contains(MARKER) {
        return None;
    }
    if line.contains("No one typed") || line.contains("was first") {
        return None;
    }
    TRIGGER_RE
        .captures(line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Session-lifetime listener: watch chat lines, echo matched triggers.
pub(crate) async fn run(
    mut rx: broadcast::Receiver<Event>,
    gateway: GatewayRef,
    token: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = token.cancelled() => return,
            ev = rx.recv() => match ev {
                Ok(ev) => {
                    let Some(trigger) = ev.chat_line().and_then(extract_trigger) else {
                        continue;
                    };
                    if rand::rng().random::<f64>() >= ECHO_CHANCE {
                        continue;
                    }
                    let delay = ECHO_DELAY_FLOOR
                        + Duration::from_millis(rand::rng().random_range(0..ECHO_DELAY_SPREAD_MS));
                    tokio::select! {
                        _ = token.cancelled() => return,
                        _ = tokio::time::sleep(delay) => {}
                    }
                    if let Err(e) = gateway.send_chat(trigger).await {
                        debug!(error = %e, "reaction echo failed");
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "reaction listener lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_the_quoted_phrase() {
        let line = r#"[Chat Reaction] First to type "lucky duck" wins!"#;
        assert_eq!(extract_trigger(line), Some("lucky duck"));
    }

    #[test]
    fn result_lines_never_match() {
        assert_eq!(
            extract_trigger(r#"[Chat Reaction] No one typed "lucky duck" in time"#),
            None
        );
        assert_eq!(
            extract_trigger(r#"[Chat Reaction] ada was first to type "lucky duck""#),
            None
        );
    }

    #[test]
    fn unrelated_chat_never_matches() {
        assert_eq!(extract_trigger(r#"ada: please type "hello""#), None);
    }
}
