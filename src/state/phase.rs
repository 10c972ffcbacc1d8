//! Timer phases and their fixed durations

use std::{fmt, time::Duration};
use serde::{Deserialize, Serialize};

/// Length of a focus phase in seconds
pub const FOCUS_TIME: u64 = 25 * 60;

/// Length of a break phase in seconds
pub const BREAK_TIME: u64 = 5 * 60;

/// How long a completed phase stays on screen before the next one is committed
pub const TRANSITION_DELAY: Duration = Duration::from_millis(1500);

/// One of the two alternating timer modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Phase {
    #[default]
    Focus,
    Break,
}

impl Phase {
    /// Nominal duration of this phase in seconds
    pub fn duration_seconds(self) -> u64 {
        match self {
            Phase::Focus => FOCUS_TIME,
            Phase::Break => BREAK_TIME,
        }
    }

    /// The phase that follows this one
    pub fn next(self) -> Phase {
        match self {
            Phase::Focus => Phase::Break,
            Phase::Break => Phase::Focus,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Focus => "FOCUS",
            Phase::Break => "BREAK",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
