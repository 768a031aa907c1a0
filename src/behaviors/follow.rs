//! Follow behavior: keep a movement goal on the configured target.
//!
//! Re-issuing the goal every tick rather than tracking goal state keeps the
//! behavior stateless: if the target left and came back, or pathing was
//! interrupted by a manual control, the next tick restores the goal.

use std::time::Duration;

use tracing::debug;

use crate::gateway::GatewayRef;

pub(crate) const NAME: &str = "follow";
pub(crate) const PERIOD: Duration = Duration::from_secs(1);

/// Standoff distance kept between the session and the target.
pub(crate) const STANDOFF: f64 = 2.0;

/// One tick: re-issue the goal while the target entity is loaded; no-op
/// otherwise.
pub(crate) async fn tick(gateway: &GatewayRef, target: &str) {
    let view = gateway.snapshot();
    if !matches!(view.players.get(target), Some(Some(_))) {
        return;
    }
    if let Err(e) = gateway.follow(target, STANDOFF).await {
        debug!(error = %e, target, "follow goal not issued");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::fake::{Call, FakeGateway};
    use crate::gateway::{Vec3, ViewState};

    #[tokio::test]
    async fn issues_goal_only_when_target_is_loaded() {
        let fake = FakeGateway::new();
        let gateway: GatewayRef = fake.clone();

        // Absent target: nothing happens.
        tick(&gateway, "ada").await;
        // Present but entity not loaded: still nothing.
        let mut view = ViewState::default();
        let _ = view.players.insert("ada".to_string(), None);
        fake.set_view(view.clone());
        tick(&gateway, "ada").await;
        assert!(fake.calls.lock().unwrap().is_empty());

        // Loaded entity: goal issued with the fixed standoff.
        let _ = view
            .players
            .insert("ada".to_string(), Some(Vec3 { x: 1.0, y: 64.0, z: 2.0 }));
        fake.set_view(view);
        tick(&gateway, "ada").await;

        let calls = fake.calls.lock().unwrap();
        assert!(
            matches!(&calls[..], [Call::Follow(t, r)] if t == "ada" && *r == STANDOFF)
        );
    }
}
