//! # Runtime events emitted by the session manager.
//!
//! [`EventKind`] classifies events across three categories:
//! - **Session lifecycle**: connecting, spawned, kicked, ended
//! - **Chat**: one event per inbound line, in arrival order
//! - **Runtime**: transport errors, feature start/skip, teardown, reconnect
//!
//! The [`Event`] struct carries optional metadata (line text, reason,
//! feature name, scheduled delay) set per kind.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically, assigned at construction.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Session lifecycle ===
    /// A connect attempt is starting.
    ///
    /// Sets: `at`, `seq`
    Connecting,

    /// The session finished entering the world and is operational.
    ///
    /// Sets: `at`, `seq`
    Spawned,

    /// The server expelled the session.
    ///
    /// Sets: `reason`, `at`, `seq`
    Kicked,

    /// The session ended (any cause).
    ///
    /// Sets: `reason`, `at`, `seq`
    Ended,

    // === Chat ===
    /// One inbound chat line from the active session.
    ///
    /// Sets: `line`, `at`, `seq`
    ChatLine,

    // === Runtime ===
    /// Connection-level fault; not terminal on its own.
    ///
    /// Sets: `reason`, `at`, `seq`
    TransportError,

    /// A feature (behavior or auxiliary server) started.
    ///
    /// Sets: `feature`, `at`, `seq`
    FeatureStarted,

    /// A feature failed to start and is skipped for this session.
    ///
    /// Sets: `feature`, `reason`, `at`, `seq`
    FeatureFailed,

    /// A reconnect was scheduled.
    ///
    /// Sets: `delay_ms`, `at`, `seq`
    ReconnectScheduled,

    /// Timers are cancelled and all auxiliary servers are closed.
    ///
    /// Sets: `at`, `seq`
    TeardownFinished,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Debug, Clone)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Inbound chat line, verbatim.
    pub line: Option<Arc<str>>,
    /// Human-readable reason (kick/end/error details).
    pub reason: Option<Arc<str>>,
    /// Feature name, if applicable.
    pub feature: Option<Arc<str>>,
    /// Scheduled delay in milliseconds (compact).
    pub delay_ms: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with the current timestamp and
    /// the next sequence number.
    pub fn now(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            line: None,
            reason: None,
            feature: None,
            delay_ms: None,
        }
    }

    /// Attaches a chat line.
    #[inline]
    pub fn with_line(mut self, line: impl Into<Arc<str>>) -> Self {
        self.line = Some(line.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a feature name.
    #[inline]
    pub fn with_feature(mut self, feature: impl Into<Arc<str>>) -> Self {
        self.feature = Some(feature.into());
        self
    }

    /// Attaches a scheduled delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Returns the chat line when this is a [`EventKind::ChatLine`] event.
    #[inline]
    pub fn chat_line(&self) -> Option<&str> {
        match self.kind {
            EventKind::ChatLine => self.line.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seq_is_monotonic() {
        let a = Event::now(EventKind::Connecting);
        let b = Event::now(EventKind::Connecting);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn chat_line_only_for_chat_events() {
        let chat = Event::now(EventKind::ChatLine).with_line("hello");
        assert_eq!(chat.chat_line(), Some("hello"));

        let ended = Event::now(EventKind::Ended).with_reason("hello");
        assert_eq!(ended.chat_line(), None);
    }
}
