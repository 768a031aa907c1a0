//! # TimerRegistry — named, single-slot background tasks.
//!
//! Every recurring or delayed behavior runs as a token-supervised tokio task
//! registered here under a stable name. The registry enforces the single-slot
//! invariant: starting a name that is already live cancels (and joins) the
//! previous owner before the replacement is installed, so two copies of one
//! behavior can never run concurrently.
//!
//! ## Architecture
//! ```text
//! start(name, f) ──► cancel(name) ──► spawn(f(token)) ──► timers[name]
//! cancel(name)   ──► token.cancel() ──► join
//! cancel_all()   ──► cancel every token ──► join every task
//! ```
//!
//! ## Rules
//! - At most one live task per name.
//! - `cancel_all()` is idempotent and safe from any state, including empty.
//! - Cancellation is cooperative: tasks are only interrupted at their await
//!   points (sleeps and tick boundaries), and `cancel*` returns only after
//!   the task has joined — after `cancel_all()` no tick runs again.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Handle to one running named task.
struct Handle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

/// Registry of named background tasks.
#[derive(Default)]
pub struct TimerRegistry {
    timers: RwLock<HashMap<String, Handle>>,
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a long-running task under `name`, cancelling any previous
    /// owner of the name first.
    ///
    /// The task must exit promptly once its token is cancelled.
    pub async fn start<F, Fut>(&self, name: impl Into<String>, f: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        let _ = self.cancel(&name).await;

        let cancel = CancellationToken::new();
        let join = tokio::spawn(f(cancel.clone()));
        debug!(timer = %name, "timer started");
        let _ = self
            .timers
            .write()
            .await
            .insert(name, Handle { cancel, join });
    }

    /// Installs a recurring tick: first run after `initial`, then every
    /// `period`. Ticks run sequentially and never overlap themselves.
    pub async fn start_repeating<F, Fut>(
        &self,
        name: impl Into<String>,
        initial: Duration,
        period: Duration,
        tick: F,
    ) where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.start(name, move |token| async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(initial) => {}
            }
            loop {
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = tick() => {}
                }
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = tokio::time::sleep(period) => {}
                }
            }
        })
        .await;
    }

    /// Installs a one-shot: runs `fut` once after `delay` unless cancelled.
    pub async fn start_once<Fut>(&self, name: impl Into<String>, delay: Duration, fut: Fut)
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.start(name, move |token| async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            tokio::select! {
                _ = token.cancelled() => {}
                _ = fut => {}
            }
        })
        .await;
    }

    /// Cancels and joins the named task. Returns whether it existed.
    pub async fn cancel(&self, name: &str) -> bool {
        let handle = self.timers.write().await.remove(name);
        match handle {
            Some(h) => {
                h.cancel.cancel();
                join_quiet(name, h.join).await;
                debug!(timer = %name, "timer cancelled");
                true
            }
            None => false,
        }
    }

    /// Cancels every registered task and waits for each to join.
    pub async fn cancel_all(&self) {
        let handles: Vec<(String, Handle)> = self.timers.write().await.drain().collect();
        if handles.is_empty() {
            return;
        }
        for (_, h) in &handles {
            h.cancel.cancel();
        }
        for (name, h) in handles {
            join_quiet(&name, h.join).await;
        }
        debug!("all timers cancelled");
    }

    /// Sorted names of registered tasks (finished one-shots included until
    /// cancelled or replaced).
    pub async fn names(&self) -> Vec<String> {
        let timers = self.timers.read().await;
        let mut names: Vec<String> = timers.keys().cloned().collect();
        names.sort_unstable();
        names
    }
}

/// Awaits a join handle, downgrading a task panic to a warning.
async fn join_quiet(name: &str, join: JoinHandle<()>) {
    if let Err(e) = join.await {
        if e.is_panic() {
            warn!(timer = %name, "timer task panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter_tick(counter: Arc<AtomicUsize>) -> impl Fn() -> std::future::Ready<()> {
        move || {
            let _ = counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn repeating_ticks_on_schedule() {
        let registry = TimerRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        registry
            .start_repeating(
                "tick",
                Duration::from_secs(5),
                Duration::from_secs(60),
                counter_tick(Arc::clone(&hits)),
            )
            .await;

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0, "initial delay not elapsed");

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn starting_a_live_name_replaces_it() {
        let registry = TimerRegistry::new();
        let old = Arc::new(AtomicUsize::new(0));
        let new = Arc::new(AtomicUsize::new(0));

        registry
            .start_repeating(
                "job",
                Duration::from_secs(1),
                Duration::from_secs(1),
                counter_tick(Arc::clone(&old)),
            )
            .await;
        registry
            .start_repeating(
                "job",
                Duration::from_secs(1),
                Duration::from_secs(1),
                counter_tick(Arc::clone(&new)),
            )
            .await;

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(old.load(Ordering::SeqCst), 0, "replaced task never ticked");
        assert!(new.load(Ordering::SeqCst) >= 9);
        assert_eq!(registry.names().await, vec!["job".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_all_stops_ticks_and_is_idempotent() {
        let registry = TimerRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        registry
            .start_repeating(
                "tick",
                Duration::from_secs(1),
                Duration::from_secs(1),
                counter_tick(Arc::clone(&hits)),
            )
            .await;

        tokio::time::sleep(Duration::from_millis(3500)).await;
        registry.cancel_all().await;
        let at_cancel = hits.load(Ordering::SeqCst);
        assert!(at_cancel >= 3);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(hits.load(Ordering::SeqCst), at_cancel, "no tick after cancel_all");

        // Safe from any state, including empty.
        registry.cancel_all().await;
        registry.cancel_all().await;
        assert!(registry.names().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn one_shot_fires_once_unless_cancelled() {
        let registry = TimerRegistry::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let f = Arc::clone(&fired);
        registry
            .start_once("later", Duration::from_secs(30), async move {
                let _ = f.fetch_add(1, Ordering::SeqCst);
            })
            .await;

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1, "one-shot never repeats");

        let f = Arc::clone(&fired);
        registry
            .start_once("never", Duration::from_secs(30), async move {
                let _ = f.fetch_add(1, Ordering::SeqCst);
            })
            .await;
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(registry.cancel("never").await);
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1, "cancelled one-shot never fires");
    }
}
