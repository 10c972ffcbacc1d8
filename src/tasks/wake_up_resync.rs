//! Wake-up resync background task

use std::{sync::Arc, time::Duration};
use tokio::time::{interval, Instant};
use tracing::{debug, info, warn};

use crate::state::AppState;

/// Wall time that may pass unaccounted for before we call it a suspension
pub const SUSPEND_TOLERANCE: Duration = Duration::from_secs(2);

/// Whether wall time ran ahead of monotonic time by more than `tolerance`
///
/// Monotonic time stops while the host sleeps; wall time keeps going.
pub fn host_was_suspended(wall_elapsed_ms: i64, monotonic_elapsed: Duration, tolerance: Duration) -> bool {
    let unaccounted = wall_elapsed_ms.saturating_sub(monotonic_elapsed.as_millis() as i64);
    unaccounted > tolerance.as_millis() as i64
}

/// Background task that detects host wake-up and forces a resync
pub async fn wake_up_resync_task(state: Arc<AppState>) {
    info!("Starting wake-up resync task");

    let mut ticker = interval(state.resync_interval);
    let mut last_wall = state.clock.now_ms();
    let mut last_monotonic = Instant::now();

    loop {
        ticker.tick().await;

        let wall = state.clock.now_ms();
        let monotonic = Instant::now();

        if host_was_suspended(wall - last_wall, monotonic - last_monotonic, SUSPEND_TOLERANCE) {
            info!(
                "Host wake-up detected ({}s unaccounted), triggering resync",
                (wall - last_wall) / 1000 - (monotonic - last_monotonic).as_secs() as i64
            );

            if let Err(e) = state.resync("wake") {
                warn!("Failed to resync after wake-up: {}", e);
            }
        } else {
            debug!("No suspension since last check");
        }

        last_wall = wall;
        last_monotonic = monotonic;
    }
}
