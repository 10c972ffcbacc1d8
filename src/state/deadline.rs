//! Deadline tracking
//!
//! While the timer runs, the absolute deadline is the only record of elapsed
//! time. Remaining seconds are recomputed from it on every tick or resume,
//! so a tick that was throttled or skipped entirely never causes drift.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Absolute wall-clock time (epoch milliseconds) at which the countdown hits zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Deadline(i64);

impl Deadline {
    pub fn from_millis(at_ms: i64) -> Self {
        Self(at_ms)
    }

    pub fn as_millis(self) -> i64 {
        self.0
    }

    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.0)
    }
}

/// Turn a remaining duration into an absolute deadline
pub fn arm(remaining_seconds: u64, now_ms: i64) -> Deadline {
    let remaining_ms = i64::try_from(remaining_seconds.saturating_mul(1000)).unwrap_or(i64::MAX);
    Deadline(now_ms.saturating_add(remaining_ms))
}

/// Recompute remaining whole seconds from a deadline, rounding half up and
/// never going below zero
pub fn reconcile(deadline: Deadline, now_ms: i64) -> u64 {
    let left_ms = deadline.0.saturating_sub(now_ms);
    if left_ms <= 0 {
        return 0;
    }
    (left_ms as u64 + 500) / 1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arm_then_reconcile_is_identity() {
        for now in [0_i64, 1, 999, 1_711_562_400_000, -5_000] {
            for remaining in [0_u64, 1, 59, 300, 1500] {
                assert_eq!(reconcile(arm(remaining, now), now), remaining);
            }
        }
    }

    #[test]
    fn reconcile_never_increases_and_floors_at_zero() {
        let deadline = arm(10, 50_000);
        let mut last = u64::MAX;
        for now in (40_000..80_000).step_by(137) {
            let remaining = reconcile(deadline, now);
            assert!(remaining <= last);
            last = remaining;
        }
        assert_eq!(last, 0);
    }

    #[test]
    fn reconcile_rounds_to_nearest_second() {
        let deadline = Deadline::from_millis(10_000);
        assert_eq!(reconcile(deadline, 8_600), 1);
        assert_eq!(reconcile(deadline, 8_500), 2);
        assert_eq!(reconcile(deadline, 9_501), 0);
    }

    #[test]
    fn far_past_deadline_is_zero() {
        // A suspended host can wake up hours after the deadline
        let deadline = arm(1500, 0);
        assert_eq!(reconcile(deadline, 10 * 3600 * 1000), 0);
    }

    #[test]
    fn deadline_converts_to_datetime() {
        let deadline = Deadline::from_millis(1_711_562_400_000);
        assert_eq!(deadline.to_datetime().unwrap().timestamp(), 1_711_562_400);
    }
}
