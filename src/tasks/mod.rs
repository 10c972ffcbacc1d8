//! Background tasks module
//!
//! This module contains background tasks that run alongside the HTTP server.

pub mod notification_clicks;
pub mod tick;
pub mod wake_up_resync;

// Re-export main functions
pub use notification_clicks::notification_click_task;
pub use tick::tick_task;
pub use wake_up_resync::wake_up_resync_task;
