//! # Event bus: broadcast fan-out and chat line router.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`] that provides
//! non-blocking publishing from multiple sources (manager, behaviors).
//!
//! ## Architecture
//! ```text
//! Publishers:                       Receivers:
//!   SessionManager ──┐                ┌──► log listener
//!                    ├────► Bus ──────┼──► notifier/viewer relay
//!   behaviors ───────┘                ├──► reactions task
//!                                     └──► autopay listener (scoped)
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never blocks.
//! - **Per-receiver FIFO**: each receiver observes events in publish order,
//!   which carries the chat router's arrival-order guarantee.
//! - **Scoped listeners**: a receiver only sees events sent after it
//!   subscribed, and dropping it deregisters it — the transaction-scoped
//!   listener contract.
//! - **Lag handling**: slow receivers get `RecvError::Lagged(n)` and skip
//!   the `n` oldest items.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for runtime events.
///
/// Cheap to clone (internally holds an `Arc`-backed sender); multiple
/// publishers may publish concurrently and each receiver gets its own clone
/// of every event.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity (clamped to ≥ 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _rx) = broadcast::channel::<Event>(capacity);
        Self { tx }
    }

    /// Publishes an event to all active receivers.
    ///
    /// If there are no receivers the event is dropped; this function still
    /// returns immediately.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a new independent receiver observing subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[tokio::test]
    async fn receivers_see_lines_in_publish_order() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();

        for i in 0..4 {
            bus.publish(Event::now(EventKind::ChatLine).with_line(format!("line {i}")));
        }
        for i in 0..4 {
            let ev = rx.recv().await.expect("event");
            assert_eq!(ev.chat_line(), Some(format!("line {i}").as_str()));
        }
    }

    #[tokio::test]
    async fn late_subscriber_misses_earlier_events() {
        let bus = Bus::new(16);
        bus.publish(Event::now(EventKind::ChatLine).with_line("early"));

        let mut rx = bus.subscribe();
        bus.publish(Event::now(EventKind::ChatLine).with_line("late"));

        let ev = rx.recv().await.expect("event");
        assert_eq!(ev.chat_line(), Some("late"));
    }
}
