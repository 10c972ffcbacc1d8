//! Phase state machine
//!
//! ```text
//!             start                 reconcile hits 0
//!  STANDBY ──────────► RUNNING ───────────────────────► TRANSITIONING
//!     ▲   ◄────────────   │                                   │
//!     │    pause / reset  │                                   │
//!     └───────────────────┴───── commit (next phase) ◄────────┘
//! ```
//!
//! The machine is pure: it never performs side effects. Every operation
//! reports which state it entered, and the coordinator in
//! [`AppState`](super::AppState) runs the entry actions for that state.
//! The `transitioning` flag doubles as the transition lock.

use std::fmt;
use serde::{Deserialize, Serialize};

use super::{
    deadline::{self, Deadline},
    phase::Phase,
};

/// Coarse state of the machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Standby,
    Running,
    Transitioning,
}

/// The state an operation moved the machine into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entered {
    /// Deadline armed; countdown in progress
    Running,
    /// Countdown stopped by pause or reset
    Standby,
    /// A phase just completed; `next` is committed after the presentation delay
    Transitioning { next: Phase },
    /// The next phase is in place, waiting for the user to start it
    Committed { phase: Phase },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerError {
    /// User actions are refused while a transition is on screen
    Transitioning,
}

impl fmt::Display for TimerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerError::Transitioning => f.write_str("a phase transition is in progress"),
        }
    }
}

impl std::error::Error for TimerError {}

/// Timer state: phase, countdown and the transition lock
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerState {
    pub phase: Phase,
    /// Cached remaining time; authoritative only while not running
    pub remaining_seconds: u64,
    pub running: bool,
    pub transitioning: bool,
    pub deadline: Option<Deadline>,
    /// Number of focus phases that ran to completion
    pub sessions_completed: u64,
}

impl TimerState {
    /// Standby at the start of a focus phase
    pub fn new() -> Self {
        Self {
            phase: Phase::Focus,
            remaining_seconds: Phase::Focus.duration_seconds(),
            running: false,
            transitioning: false,
            deadline: None,
            sessions_completed: 0,
        }
    }

    pub fn status(&self) -> Status {
        if self.transitioning {
            Status::Transitioning
        } else if self.running {
            Status::Running
        } else {
            Status::Standby
        }
    }

    /// Begin counting down from the current remaining time
    pub fn start(&mut self, now_ms: i64) -> Result<Option<Entered>, TimerError> {
        if self.transitioning {
            return Err(TimerError::Transitioning);
        }
        if self.running {
            return Ok(None);
        }
        self.deadline = Some(deadline::arm(self.remaining_seconds, now_ms));
        self.running = true;
        Ok(Some(Entered::Running))
    }

    /// Stop counting down, keeping the remaining time
    ///
    /// If the deadline has already passed the pause turns into a completion.
    pub fn pause(&mut self, now_ms: i64) -> Result<Option<Entered>, TimerError> {
        if self.transitioning {
            return Err(TimerError::Transitioning);
        }
        if !self.running {
            return Ok(None);
        }
        self.refresh(now_ms);
        if self.remaining_seconds == 0 {
            return Ok(self.complete_phase());
        }
        self.running = false;
        self.deadline = None;
        Ok(Some(Entered::Standby))
    }

    /// Start when in standby, pause when running
    pub fn toggle(&mut self, now_ms: i64) -> Result<Option<Entered>, TimerError> {
        if self.running {
            self.pause(now_ms)
        } else {
            self.start(now_ms)
        }
    }

    /// Back to the full duration of the current phase, stopped
    pub fn reset(&mut self) -> Result<Entered, TimerError> {
        if self.transitioning {
            return Err(TimerError::Transitioning);
        }
        self.running = false;
        self.deadline = None;
        self.transitioning = false;
        self.remaining_seconds = self.phase.duration_seconds();
        Ok(Entered::Standby)
    }

    /// Reconcile against the deadline; completes the phase on reaching zero
    ///
    /// Used for both periodic ticks and foreground resyncs. Does nothing
    /// unless the timer is running.
    pub fn tick(&mut self, now_ms: i64) -> Option<Entered> {
        if self.transitioning || !self.running {
            return None;
        }
        self.refresh(now_ms);
        if self.remaining_seconds == 0 {
            self.complete_phase()
        } else {
            None
        }
    }

    /// Enter TRANSITIONING, unless a transition already holds the lock
    pub fn complete_phase(&mut self) -> Option<Entered> {
        if self.transitioning {
            return None;
        }
        self.transitioning = true;
        self.running = false;
        self.deadline = None;
        self.remaining_seconds = 0;
        Some(Entered::Transitioning { next: self.phase.next() })
    }

    /// Swap in the next phase and release the transition lock
    ///
    /// The timer is left stopped; the user has to start the next phase.
    pub fn commit_transition(&mut self) -> Option<Entered> {
        if !self.transitioning {
            return None;
        }
        if self.phase == Phase::Focus {
            self.sessions_completed += 1;
        }
        self.phase = self.phase.next();
        self.remaining_seconds = self.phase.duration_seconds();
        self.transitioning = false;
        Some(Entered::Committed { phase: self.phase })
    }

    /// Fraction of the current phase already elapsed, as a percentage
    pub fn progress_percent(&self) -> f64 {
        let total = self.phase.duration_seconds() as f64;
        (total - self.remaining_seconds as f64) / total * 100.0
    }

    fn refresh(&mut self, now_ms: i64) {
        if let Some(deadline) = self.deadline {
            self.remaining_seconds =
                deadline::reconcile(deadline, now_ms).min(self.phase.duration_seconds());
        }
    }
}

impl Default for TimerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Format seconds as `mm:ss`
pub fn format_time(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}
