//! Automated interaction: periodically face the best nearby marker and run
//! the fixed two-phase interact sequence against it.

use std::time::Duration;

use tracing::{debug, info};

use crate::gateway::{GatewayRef, InteractPhase, Vec3, ViewState};

pub(crate) const NAME: &str = "clicker";
pub(crate) const PERIOD: Duration = Duration::from_secs(600);

/// Candidate markers further than this from the session are ignored.
pub(crate) const RADIUS: f64 = 3.0;
/// Gap between facing and phase one, and between the two phases.
const PHASE_GAP: Duration = Duration::from_millis(50);

/// Best candidate within range: ties on distance don't matter, the highest
/// marker wins.
pub(crate) fn pick_marker(view: &ViewState) -> Option<Vec3> {
    view.markers
        .iter()
        .filter(|m| m.distance_sq(&view.position) <= RADIUS * RADIUS)
        .copied()
        .max_by(|a, b| a.y.total_cmp(&b.y))
}

/// One tick of the interaction sequence; logged no-op without a candidate.
pub(crate) async fn tick(gateway: &GatewayRef) {
    let view = gateway.snapshot();
    let Some(marker) = pick_marker(&view) else {
        info!("no interaction candidate in range");
        return;
    };

    if let Err(e) = gateway.look_at(marker).await {
        debug!(error = %e, "could not face marker");
        return;
    }
    tokio::time::sleep(PHASE_GAP).await;
    if let Err(e) = gateway.interact(marker, InteractPhase::Begin).await {
        debug!(error = %e, "interact begin failed");
        return;
    }
    tokio::time::sleep(PHASE_GAP).await;
    if let Err(e) = gateway.interact(marker, InteractPhase::End).await {
        debug!(error = %e, "interact end failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::fake::{Call, FakeGateway};

    fn view_with_markers(markers: Vec<Vec3>) -> ViewState {
        ViewState {
            markers,
            ..ViewState::default()
        }
    }

    #[test]
    fn picks_the_highest_marker_in_range() {
        let view = view_with_markers(vec![
            Vec3 { x: 1.0, y: 64.0, z: 0.0 },
            Vec3 { x: 0.0, y: 66.0, z: 1.0 },
            Vec3 { x: 50.0, y: 99.0, z: 0.0 }, // out of range
        ]);
        // Own position defaults to the origin; only y differs in range.
        let mut view = view;
        view.position = Vec3 { x: 0.0, y: 64.0, z: 0.0 };
        assert_eq!(pick_marker(&view), Some(Vec3 { x: 0.0, y: 66.0, z: 1.0 }));
    }

    #[test]
    fn no_candidate_out_of_range() {
        let mut view = view_with_markers(vec![Vec3 { x: 10.0, y: 64.0, z: 0.0 }]);
        view.position = Vec3::default();
        assert_eq!(pick_marker(&view), None);
    }

    #[tokio::test(start_paused = true)]
    async fn runs_the_two_phase_sequence() {
        let fake = FakeGateway::new();
        let gateway: GatewayRef = fake.clone();
        let marker = Vec3 { x: 1.0, y: 65.0, z: 0.0 };
        fake.set_view(view_with_markers(vec![marker]));

        tick(&gateway).await;

        let calls = fake.calls.lock().unwrap();
        assert!(matches!(
            &calls[..],
            [
                Call::LookAt(m1),
                Call::Interact(m2, InteractPhase::Begin),
                Call::Interact(m3, InteractPhase::End),
            ] if *m1 == marker && *m2 == marker && *m3 == marker
        ));
    }

    #[tokio::test]
    async fn no_marker_means_no_calls() {
        let fake = FakeGateway::new();
        let gateway: GatewayRef = fake.clone();
        tick(&gateway).await;
        assert!(fake.calls.lock().unwrap().is_empty());
    }
}
