//! Screen wake-lock held through `systemd-inhibit`

use std::{process::Stdio, sync::Mutex};
use tokio::{
    process::Command,
    sync::oneshot,
    task::JoinHandle,
};
use tracing::{debug, info, warn};

/// A held inhibitor. The lock lasts as long as the child process does.
///
/// A watcher task owns the child. It logs an inhibitor that exits on its
/// own, and kills it once the lock is dropped.
#[derive(Debug)]
pub struct WakeLock {
    _release: oneshot::Sender<()>,
    watcher: JoinHandle<()>,
}

impl WakeLock {
    pub fn acquire(program: &str, who: &str) -> Result<Self, String> {
        let mut command = Command::new(program);
        command
            .args(["--what=idle:sleep", "--mode=block"])
            .arg(format!("--who={}", who))
            .arg("--why=Focus timer running")
            .args(["sleep", "infinity"]);

        Self::hold(command).map_err(|e| format!("Failed to execute {}: {}", program, e))
    }

    fn hold(mut command: Command) -> std::io::Result<Self> {
        let mut child = command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let (release, mut released) = oneshot::channel::<()>();
        let watcher = tokio::spawn(async move {
            let exited = tokio::select! {
                status = child.wait() => Some(status),
                _ = &mut released => None,
            };
            match exited {
                Some(Ok(status)) => warn!("Wake-lock lost, inhibitor exited with {}", status),
                Some(Err(e)) => warn!("Wake-lock lost: {}", e),
                None => {
                    if let Err(e) = child.kill().await {
                        debug!("Inhibitor already exited: {}", e);
                    }
                }
            }
        });

        Ok(Self { _release: release, watcher })
    }

    /// Whether the inhibitor is still running
    pub fn is_active(&self) -> bool {
        !self.watcher.is_finished()
    }
}

/// Optional wake-lock slot, acquired on start and released on every stop path
#[derive(Debug)]
pub struct WakeLockSlot {
    program: String,
    who: String,
    held: Mutex<Option<WakeLock>>,
}

impl WakeLockSlot {
    pub fn new(program: &str, who: &str) -> Self {
        Self {
            program: program.to_string(),
            who: who.to_string(),
            held: Mutex::new(None),
        }
    }

    pub fn is_held(&self) -> bool {
        self.held
            .lock()
            .map(|h| h.as_ref().is_some_and(WakeLock::is_active))
            .unwrap_or(false)
    }

    pub fn acquire(&self) {
        let Ok(mut held) = self.held.lock() else {
            warn!("Wake-lock slot poisoned");
            return;
        };
        if held.as_ref().is_some_and(WakeLock::is_active) {
            return;
        }
        match WakeLock::acquire(&self.program, &self.who) {
            Ok(lock) => {
                info!("Wake-lock acquired");
                *held = Some(lock);
            }
            Err(e) => {
                warn!("Wake-lock unavailable: {}", e);
                *held = None;
            }
        }
    }

    pub fn release(&self) {
        if let Ok(mut held) = self.held.lock() {
            if held.take().is_some() {
                info!("Wake-lock released");
            }
        }
    }
}
