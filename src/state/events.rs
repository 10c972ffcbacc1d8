//! Snapshots and events published to clients

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    phase::Phase,
    timer_state::{format_time, Status, TimerState},
};

/// Read-only view of the timer for clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    pub status: Status,
    pub phase: Phase,
    pub remaining_seconds: u64,
    /// Remaining time as `mm:ss`
    pub display: String,
    pub progress_percent: f64,
    pub running: bool,
    pub transitioning: bool,
    pub deadline: Option<DateTime<Utc>>,
    pub sessions_completed: u64,
}

impl From<&TimerState> for TimerSnapshot {
    fn from(timer: &TimerState) -> Self {
        Self {
            status: timer.status(),
            phase: timer.phase,
            remaining_seconds: timer.remaining_seconds,
            display: format_time(timer.remaining_seconds),
            progress_percent: timer.progress_percent(),
            running: timer.running,
            transitioning: timer.transitioning,
            deadline: timer.deadline.and_then(|d| d.to_datetime()),
            sessions_completed: timer.sessions_completed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimerEvent {
    Snapshot(TimerSnapshot),
    TransitionStarted { next: Phase },
    PhaseCommitted { phase: Phase },
    FocusWindow { id: u64 },
    OpenWindow { url: String },
    NotificationDismissed { tag: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_of_fresh_timer() {
        let snapshot = TimerSnapshot::from(&TimerState::new());
        assert_eq!(snapshot.status, Status::Standby);
        assert_eq!(snapshot.display, "25:00");
        assert_eq!(snapshot.deadline, None);
    }

    #[test]
    fn events_are_tagged() {
        let event = TimerEvent::TransitionStarted { next: Phase::Break };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "transition_started");
        assert_eq!(json["next"], "BREAK");

        let snapshot = TimerEvent::Snapshot(TimerSnapshot::from(&TimerState::new()));
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["type"], "snapshot");
        assert_eq!(json["status"], "STANDBY");
    }
}
