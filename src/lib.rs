//! Surge Timer - A focus/break countdown daemon that survives host suspension
//!
//! This library provides the phase state machine, deadline reconciliation,
//! transition coordination and the desktop side effects (alert tone,
//! keepalive stream, notifications, wake-lock) behind a local HTTP API.

pub mod api;
pub mod clock;
pub mod config;
pub mod effects;
pub mod state;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use api::create_router;
pub use clock::{Clock, SystemClock};
pub use config::Config;
pub use state::AppState;
pub use utils::signals::shutdown_signal;
