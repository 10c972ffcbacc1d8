//! Process-level helpers shared by the binary

pub mod runtime;
pub mod signals;

pub use signals::shutdown_signal;
