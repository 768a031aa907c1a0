//! Periodic roster report: snapshot the known players and send them to the
//! roster channel as a delimited multi-message block.

use std::sync::Arc;
use std::time::Duration;

use crate::gateway::GatewayRef;
use crate::notify::Notify;

pub(crate) const NAME: &str = "roster";
pub(crate) const INITIAL_DELAY: Duration = Duration::from_secs(5);
pub(crate) const PERIOD: Duration = Duration::from_secs(60);

/// Per-message character budget; names are never split across messages.
pub(crate) const CHUNK_BUDGET: usize = 1900;

const START_MARK: &str = "----start player list----";
const END_MARK: &str = "----end player list----";

/// Joins names with `", "` into chunks of at most `budget` characters,
/// starting a new chunk rather than splitting a name. A single name longer
/// than the budget becomes its own oversized chunk.
pub(crate) fn chunk_names<S: AsRef<str>>(names: &[S], budget: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    for name in names {
        let name = name.as_ref();
        if !current.is_empty() && current.len() + 2 + name.len() > budget {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push_str(", ");
        }
        current.push_str(name);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// One report tick.
pub(crate) async fn tick(gateway: &GatewayRef, notifier: &Arc<dyn Notify>) {
    let names: Vec<String> = gateway.snapshot().players.keys().cloned().collect();

    notifier.send(START_MARK);
    if names.is_empty() {
        notifier.send("No players");
    } else {
        for chunk in chunk_names(&names, CHUNK_BUDGET) {
            notifier.send(&chunk);
        }
    }
    notifier.send(END_MARK);
}
