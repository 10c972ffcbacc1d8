//! Runtime lifecycle for the daemon

use std::{future::Future, time::Duration};
use tokio::runtime::Runtime;
use tracing::debug;

/// How long blocking work may hold up exit once the server has stopped
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Run `main` on a fresh multi-threaded runtime, then shut it down
///
/// Notification waiters park a blocking thread until the user reacts, so
/// dropping the runtime could wait forever. Anything still blocking after
/// [`SHUTDOWN_GRACE`] is abandoned.
pub fn run<F>(main: F) -> anyhow::Result<()>
where
    F: Future<Output = anyhow::Result<()>>,
{
    let runtime = Runtime::new()?;
    let result = runtime.block_on(main);
    debug!("Stopping runtime");
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    result
}
