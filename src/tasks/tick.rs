//! Periodic countdown tick

use std::sync::Arc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::state::AppState;

/// Ticks the countdown while it runs
///
/// Ticks are advisory: each one reconciles against the deadline, so a
/// delayed or skipped tick costs nothing but display latency. Pausing,
/// resetting or completing the phase drops the running flag, which cancels
/// the tick loop until the next start.
pub async fn tick_task(state: Arc<AppState>) {
    info!("Starting tick task");

    let mut running_rx = state.running_tx.subscribe();

    loop {
        if !*running_rx.borrow_and_update() {
            if running_rx.changed().await.is_err() {
                error!("Running state channel closed, stopping tick task");
                return;
            }
            continue;
        }

        debug!("Countdown running, ticking every {:?}", state.tick_interval);
        let mut ticker = interval_at(Instant::now() + state.tick_interval, state.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match state.on_tick() {
                        Ok(Some(entered)) => {
                            debug!("Tick moved timer to {:?}", entered);
                            break;
                        }
                        Ok(None) => {}
                        Err(e) => error!("Tick failed: {}", e),
                    }
                }

                changed = running_rx.changed() => {
                    if changed.is_err() {
                        error!("Running state channel closed, stopping tick task");
                        return;
                    }
                    if !*running_rx.borrow_and_update() {
                        debug!("Countdown stopped, cancelling ticks");
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::sleep;
    use crate::{
        effects::testing::{harness, EffectCall},
        state::{phase::FOCUS_TIME, Phase, Status},
    };

    #[tokio::test(start_paused = true)]
    async fn ticks_drive_the_phase_to_completion() {
        let (state, clock, effects) = harness();
        tokio::spawn(tick_task(Arc::clone(&state)));

        state.start().unwrap();
        clock.advance(Duration::from_secs(FOCUS_TIME));
        sleep(Duration::from_millis(1200)).await;

        assert_eq!(state.snapshot().unwrap().status, Status::Transitioning);
        assert_eq!(effects.count(&EffectCall::PlayAlert), 1);

        sleep(Duration::from_secs(2)).await;
        let snapshot = state.snapshot().unwrap();
        assert_eq!(snapshot.phase, Phase::Break);
        assert_eq!(snapshot.status, Status::Standby);
        assert_eq!(effects.count(&EffectCall::PlayAlert), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_refresh_remaining_time() {
        let (state, clock, _effects) = harness();
        tokio::spawn(tick_task(Arc::clone(&state)));

        state.start().unwrap();
        clock.advance(Duration::from_secs(42));
        sleep(Duration::from_millis(1100)).await;

        assert_eq!(state.snapshot().unwrap().remaining_seconds, FOCUS_TIME - 42);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_cancels_ticking() {
        let (state, clock, effects) = harness();
        tokio::spawn(tick_task(Arc::clone(&state)));

        state.start().unwrap();
        sleep(Duration::from_millis(1500)).await;
        state.pause().unwrap();

        clock.advance(Duration::from_secs(FOCUS_TIME * 2));
        sleep(Duration::from_secs(10)).await;

        let snapshot = state.snapshot().unwrap();
        assert_eq!(snapshot.status, Status::Standby);
        assert_eq!(snapshot.remaining_seconds, FOCUS_TIME);
        assert_eq!(effects.count(&EffectCall::PlayAlert), 0);
    }
}
