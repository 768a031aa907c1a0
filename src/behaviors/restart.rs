//! Scheduled restart: poll the wall clock in the configured time zone and
//! ask the manager to restart when the target minute is reached.
//!
//! Polling every minute (instead of arming a one-shot absolute alarm)
//! tolerates process suspension and clock skew: a missed check is re-run on
//! the next tick rather than lost.

use std::time::Duration;

use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::session::Command;

pub(crate) const NAME: &str = "restart";
pub(crate) const POLL_PERIOD: Duration = Duration::from_secs(60);

/// Target local wall-clock time for the daily restart.
pub(crate) const TARGET_HOUR: u32 = 23;
pub(crate) const TARGET_MINUTE: u32 = 56;

/// Delay before reconnecting after a scheduled restart.
pub(crate) const REJOIN_DELAY: Duration = Duration::from_secs(8 * 60);

/// Whether the instant falls in the restart minute of the given zone.
pub(crate) fn is_restart_due(now: DateTime<Utc>, tz: Tz) -> bool {
    let local = now.with_timezone(&tz);
    local.hour() == TARGET_HOUR && local.minute() == TARGET_MINUTE
}

/// One poll tick.
pub(crate) async fn tick(tz: Tz, commands: &mpsc::Sender<Command>) {
    if !is_restart_due(Utc::now(), tz) {
        return;
    }
    info!(zone = %tz, "scheduled restart window reached");
    if commands.send(Command::Restart).await.is_err() {
        debug!("manager command channel closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn due_at_the_target_minute_in_the_target_zone() {
        // 04:56 UTC in January is 23:56 the previous evening in New York
        // (EST, UTC-5).
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 4, 56, 30).unwrap();
        assert!(is_restart_due(now, Tz::America__New_York));
    }

    #[test]
    fn not_due_one_minute_off() {
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 4, 55, 59).unwrap();
        assert!(!is_restart_due(now, Tz::America__New_York));
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 4, 57, 0).unwrap();
        assert!(!is_restart_due(now, Tz::America__New_York));
    }

    #[test]
    fn zone_matters() {
        // 22:56 UTC in January is 23:56 in Berlin (CET, UTC+1) but 17:56 in
        // New York.
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 22, 56, 0).unwrap();
        assert!(is_restart_due(now, Tz::Europe__Berlin));
        assert!(!is_restart_due(now, Tz::America__New_York));
    }
}
