//! Side-effect adapters
//!
//! Everything the timer does to the outside world goes through
//! [`SideEffects`]. Calls are fire-and-forget: an adapter that fails logs
//! the problem and returns, and the state machine never waits on one.

pub mod audio;
pub mod notification;
pub mod system;
pub mod wake_lock;

#[cfg(test)]
pub mod testing;

use serde::{Deserialize, Serialize};

use crate::state::Phase;

pub use system::SystemEffects;

/// Grouping tag so a new completion notification replaces an undismissed one
pub const NOTIFICATION_TAG: &str = "pomodoro-alert";

/// Vibration pattern in milliseconds (on, off, on)
pub const VIBRATION_PATTERN: [u32; 3] = [200, 100, 200];

pub const NOTIFICATION_ICON: &str = "alarm-clock";

/// Capabilities the coordinator drives from state-entry points
pub trait SideEffects: Send + Sync {
    /// Create the shared audio output if it does not exist yet. Only called
    /// from a user-initiated start.
    fn prepare_audio(&self);

    /// Ask (again) for permission to show notifications
    fn request_notification_permission(&self);

    fn notification_permission(&self) -> NotificationPermission;

    /// Record a permission decision made by the user elsewhere
    fn set_notification_permission(&self, permission: NotificationPermission);

    fn acquire_wake_lock(&self);

    fn release_wake_lock(&self);

    /// Start the inaudible keepalive stream
    fn start_keepalive(&self);

    fn stop_keepalive(&self);

    /// Play the three-pulse completion alert
    fn play_alert(&self);

    /// Show a notification; skipped unless permission was granted
    fn notify(&self, payload: NotificationPayload);

    /// Open a new application window at `url`
    fn open_window(&self, url: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationPermission {
    #[default]
    Default,
    Granted,
    Denied,
}

/// Content of a phase-completion notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    pub tag: String,
    pub icon: String,
    /// Keep the notification on screen until the user deals with it
    pub require_interaction: bool,
    pub vibrate: Vec<u32>,
}

impl NotificationPayload {
    /// Notification announcing that `next` is about to begin
    pub fn for_next_phase(next: Phase) -> Self {
        let (title, body) = match next {
            Phase::Break => (
                "NEON_SURGE: FOCUS_COMPLETE",
                "Energy reserves full. Starting the 5 minute break.",
            ),
            Phase::Focus => (
                "NEON_SURGE: BREAK_OVER",
                "Break over. Re-entering focus protocol.",
            ),
        };

        Self {
            title: title.to_string(),
            body: body.to_string(),
            tag: NOTIFICATION_TAG.to_string(),
            icon: NOTIFICATION_ICON.to_string(),
            require_interaction: true,
            vibrate: VIBRATION_PATTERN.to_vec(),
        }
    }
}
