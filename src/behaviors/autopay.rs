//! # Auto-pay transaction.
//!
//! A one-shot request/response protocol layered on free-form chat: the
//! remote server's only balance/payment interface is conversational text.
//!
//! ## Protocol
//! ```text
//! subscribe bus ──► send balance query
//!        │
//!        ├─ line matches "Balance: $…" ──► drop listener
//!        │        └─► 1s ─► pay ─► 1.5s ─► pay again ─► done
//!        │
//!        └─ 10s without a match ──► drop listener ─► done (no payment)
//! ```
//!
//! ## Rules
//! - The listener subscribes **before** the query is sent, so the reply
//!   cannot slip past it.
//! - First match wins; the listener is dropped before any payment is sent,
//!   so a second coincidental match cannot restart the transaction.
//! - The payment is sent twice to cover server-side message loss; the
//!   protocol cannot distinguish success from failure of either send.
//! - A missed reply is logged, not retried; the next scheduled trigger
//!   tries again.
//! - At most one transaction runs at a time: the hourly trigger is a
//!   single-slot timer with sequential ticks, and the pre-restart trigger
//!   only runs after those timers are cancelled.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::events::Bus;
use crate::gateway::GatewayRef;

pub(crate) const NAME: &str = "autopay";
pub(crate) const KICKOFF_NAME: &str = "autopay-kickoff";
pub(crate) const PERIOD: Duration = Duration::from_secs(60 * 60);
pub(crate) const KICKOFF_DELAY: Duration = Duration::from_secs(30);

const BALANCE_QUERY: &str = "/bal";
const REPLY_TIMEOUT: Duration = Duration::from_secs(10);
const FIRST_PAY_DELAY: Duration = Duration::from_secs(1);
const SECOND_PAY_DELAY: Duration = Duration::from_millis(1500);

/// "Balance:" token, then a currency amount: digits with optional thousands
/// separators and an optional fraction, prefixed by the currency symbol.
static BALANCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)balance:\s*\$([\d,]+\.?\d*)").expect("balance pattern"));

/// Extracts the amount (separators preserved) from a balance reply.
pub(crate) fn parse_balance(line: &str) -> Option<&str> {
    BALANCE_RE
        .captures(line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Runs one transaction to completion (payment sent twice, or timeout).
pub(crate) async fn run(gateway: &GatewayRef, bus: &Bus, recipient: &str) {
    let mut rx = bus.subscribe();

    info!("auto-pay: querying balance");
    if let Err(e) = gateway.send_chat(BALANCE_QUERY).await {
        warn!(error = %e, "auto-pay: balance query failed");
        return;
    }

    let deadline = tokio::time::sleep(REPLY_TIMEOUT);
    tokio::pin!(deadline);
    let amount = loop {
        tokio::select! {
            _ = &mut deadline => {
                info!("auto-pay: no balance reply within {REPLY_TIMEOUT:?}");
                return;
            }
            ev = rx.recv() => match ev {
                Ok(ev) => {
                    if let Some(a) = ev.chat_line().and_then(parse_balance) {
                        break a.to_string();
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "auto-pay listener lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    };
    drop(rx);

    info!(amount = %amount, recipient, "auto-pay: balance matched");
    let pay = format!("/pay {recipient} {amount}");

    tokio::time::sleep(FIRST_PAY_DELAY).await;
    if let Err(e) = gateway.send_chat(&pay).await {
        warn!(error = %e, "auto-pay: first payment send failed");
    }
    tokio::time::sleep(SECOND_PAY_DELAY).await;
    if let Err(e) = gateway.send_chat(&pay).await {
        warn!(error = %e, "auto-pay: second payment send failed");
    }
    info!("auto-pay: complete");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Event, EventKind};
    use crate::gateway::fake::FakeGateway;

    #[test]
    fn parses_amounts_with_separators_and_fractions() {
        assert_eq!(parse_balance("Balance: $1,234.56"), Some("1,234.56"));
        assert_eq!(parse_balance("balance:$5"), Some("5"));
        assert_eq!(parse_balance("Your Balance:   $42.00 as of today"), Some("42.00"));
        assert_eq!(parse_balance("Balance: 100"), None, "currency symbol required");
        assert_eq!(parse_balance("you have $5"), None, "token required");
    }

    fn chat(line: &str) -> Event {
        Event::now(EventKind::ChatLine).with_line(line)
    }

    #[tokio::test(start_paused = true)]
    async fn matched_balance_pays_twice_with_the_fixed_spacing() {
        let fake = FakeGateway::new();
        let gateway: GatewayRef = fake.clone();
        let bus = Bus::new(16);

        let task = {
            let bus = bus.clone();
            tokio::spawn(async move { run(&gateway, &bus, "alice").await })
        };
        // Let the transaction subscribe and send its query.
        tokio::task::yield_now().await;
        let match_at = tokio::time::Instant::now();
        bus.publish(chat("Balance: $1,234.56"));
        task.await.expect("transaction");

        let chats = fake.chats();
        assert_eq!(chats.len(), 3);
        assert_eq!(chats[0].0, "/bal");
        assert_eq!(chats[1].0, "/pay alice 1,234.56");
        assert_eq!(chats[2].0, "/pay alice 1,234.56");
        assert_eq!(chats[1].1 - match_at, Duration::from_secs(1));
        assert_eq!(chats[2].1 - chats[1].1, Duration::from_millis(1500));
        // Resolves within 2.5s of the match.
        assert_eq!(
            tokio::time::Instant::now() - match_at,
            Duration::from_millis(2500)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn first_match_wins_and_later_lines_cannot_double_fire() {
        let fake = FakeGateway::new();
        let gateway: GatewayRef = fake.clone();
        let bus = Bus::new(16);

        let task = {
            let bus = bus.clone();
            tokio::spawn(async move { run(&gateway, &bus, "alice").await })
        };
        tokio::task::yield_now().await;
        bus.publish(chat("Balance: $10"));
        bus.publish(chat("Balance: $999"));
        task.await.expect("transaction");

        let pays: Vec<_> = fake
            .chats()
            .into_iter()
            .filter(|(t, _)| t.starts_with("/pay"))
            .collect();
        assert_eq!(pays.len(), 2);
        assert!(pays.iter().all(|(t, _)| t == "/pay alice 10"));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_resolves_without_payment_and_deregisters() {
        let fake = FakeGateway::new();
        let gateway: GatewayRef = fake.clone();
        let bus = Bus::new(16);

        let task = {
            let bus = bus.clone();
            tokio::spawn(async move { run(&gateway, &bus, "alice").await })
        };
        tokio::task::yield_now().await;
        bus.publish(chat("ada: hello"));
        let started = tokio::time::Instant::now();
        task.await.expect("transaction");
        assert_eq!(tokio::time::Instant::now() - started, REPLY_TIMEOUT);

        // A balance-looking line after resolution must not trigger anything.
        bus.publish(chat("Balance: $999.99"));
        tokio::time::sleep(Duration::from_secs(5)).await;

        let chats = fake.chats();
        assert_eq!(chats.len(), 1, "only the query was sent");
        assert_eq!(chats[0].0, "/bal");
    }
}
