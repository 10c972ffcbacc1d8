//! State management module
//!
//! The pure phase state machine, deadline tracking, and the shared
//! application state that coordinates them with side effects.

pub mod app_state;
pub mod deadline;
pub mod events;
pub mod phase;
pub mod timer_state;
pub mod windows;

// Re-export main types
pub use app_state::{ActionError, AppState};
pub use deadline::Deadline;
pub use events::{TimerEvent, TimerSnapshot};
pub use phase::Phase;
pub use timer_state::{Entered, Status, TimerError, TimerState};
pub use windows::{ClickRoute, ClientWindow, WindowRegistry};
