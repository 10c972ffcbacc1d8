//! Desktop notifications
//!
//! Shown through the freedesktop notification server. Each completion
//! notification replaces the previous one, stays up until dismissed, and a
//! click on it is forwarded to the coordinator for window routing.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex,
};
use notify_rust::{Notification, Timeout};
use serde::{Deserialize, Serialize};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

use super::{NotificationPayload, NotificationPermission};

/// A notification the user clicked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationClick {
    pub tag: String,
}

/// Asks the notification server whether it is there
pub type ServerProbe = fn() -> Result<(), String>;

#[derive(Debug)]
pub struct DesktopNotifier {
    appname: String,
    enabled: bool,
    permission: Arc<Mutex<NotificationPermission>>,
    probe: ServerProbe,
    /// Server id of the last notification shown, so the next one replaces it
    last_id: Arc<Mutex<Option<u32>>>,
    /// Bumped for every notification; only the newest one forwards clicks
    generation: Arc<AtomicU64>,
    clicks: mpsc::UnboundedSender<NotificationClick>,
}

impl DesktopNotifier {
    pub fn new(
        appname: &str,
        enabled: bool,
        clicks: mpsc::UnboundedSender<NotificationClick>,
    ) -> Self {
        let permission = if enabled {
            NotificationPermission::Default
        } else {
            NotificationPermission::Denied
        };

        Self {
            appname: appname.to_string(),
            enabled,
            permission: Arc::new(Mutex::new(permission)),
            probe: probe_server,
            last_id: Arc::new(Mutex::new(None)),
            generation: Arc::new(AtomicU64::new(0)),
            clicks,
        }
    }

    /// Use another way of finding the notification server
    pub fn with_probe(mut self, probe: ServerProbe) -> Self {
        self.probe = probe;
        self
    }

    pub fn permission(&self) -> NotificationPermission {
        self.permission
            .lock()
            .map(|p| *p)
            .unwrap_or(NotificationPermission::Denied)
    }

    pub fn set_permission(&self, permission: NotificationPermission) {
        if let Ok(mut current) = self.permission.lock() {
            *current = permission;
        }
    }

    /// Probe the notification server and record the answer
    ///
    /// Only an undecided permission is probed. A decision already made,
    /// including one set by the user while the probe runs, is kept.
    pub fn request_permission(&self) -> Option<JoinHandle<()>> {
        if !self.enabled {
            debug!("Notifications disabled, not requesting permission");
            return None;
        }
        if self.permission() != NotificationPermission::Default {
            return None;
        }

        let permission = Arc::clone(&self.permission);
        let probe = self.probe;
        Some(tokio::task::spawn_blocking(move || {
            let answer = match probe() {
                Ok(()) => NotificationPermission::Granted,
                Err(e) => {
                    warn!("Notification server unavailable: {}", e);
                    NotificationPermission::Denied
                }
            };
            match permission.lock() {
                Ok(mut current) if *current == NotificationPermission::Default => {
                    info!("Notification permission: {:?}", answer);
                    *current = answer;
                }
                Ok(current) => debug!("Permission already decided as {:?}", *current),
                Err(e) => warn!("Failed to record notification permission: {}", e),
            }
        }))
    }

    pub fn notify(&self, payload: NotificationPayload) {
        if self.permission() != NotificationPermission::Granted {
            debug!("Notification permission not granted, skipping \"{}\"", payload.title);
            return;
        }

        let appname = self.appname.clone();
        let last_id = Arc::clone(&self.last_id);
        let generation = Arc::clone(&self.generation);
        let current = generation.fetch_add(1, Ordering::SeqCst) + 1;
        let clicks = self.clicks.clone();
        tokio::task::spawn_blocking(move || {
            show(&appname, payload, &last_id, &clicks, || {
                generation.load(Ordering::SeqCst) == current
            })
        });
    }
}

#[cfg(all(unix, not(target_os = "macos")))]
fn probe_server() -> Result<(), String> {
    let server = notify_rust::get_server_information().map_err(|e| e.to_string())?;
    debug!("Notification server: {} {} ({})", server.name, server.version, server.vendor);
    Ok(())
}

#[cfg(not(all(unix, not(target_os = "macos"))))]
fn probe_server() -> Result<(), String> {
    Ok(())
}

#[cfg(all(unix, not(target_os = "macos")))]
fn show(
    appname: &str,
    payload: NotificationPayload,
    last_id: &Mutex<Option<u32>>,
    clicks: &mpsc::UnboundedSender<NotificationClick>,
    is_newest: impl Fn() -> bool,
) {
    use notify_rust::Urgency;

    let mut notification = Notification::new();
    notification
        .summary(&payload.title)
        .body(&payload.body)
        .icon(&payload.icon)
        .appname(appname)
        .urgency(Urgency::Critical)
        .action("default", "Open");
    if payload.require_interaction {
        notification.timeout(Timeout::Never);
    }
    if let Some(id) = last_id.lock().ok().and_then(|id| *id) {
        notification.id(id);
    }
    debug!("Vibration pattern {:?} ignored on desktop", payload.vibrate);

    let handle = match notification.show() {
        Ok(handle) => handle,
        Err(e) => {
            warn!("Failed to show notification: {}", e);
            return;
        }
    };
    if let Ok(mut id) = last_id.lock() {
        *id = Some(handle.id());
    }

    // Replacements share the server id, so every earlier waiter sees the
    // same click. Only the newest one forwards it.
    let tag = payload.tag;
    handle.wait_for_action(|action| {
        if action != "default" || !is_newest() {
            return;
        }
        if let Err(e) = clicks.send(NotificationClick { tag }) {
            warn!("Failed to forward notification click: {}", e);
        }
    });
}

#[cfg(not(all(unix, not(target_os = "macos"))))]
fn show(
    appname: &str,
    payload: NotificationPayload,
    _last_id: &Mutex<Option<u32>>,
    _clicks: &mpsc::UnboundedSender<NotificationClick>,
    _is_newest: impl Fn() -> bool,
) {
    let mut notification = Notification::new();
    notification
        .summary(&payload.title)
        .body(&payload.body)
        .appname(appname);
    if payload.require_interaction {
        notification.timeout(Timeout::Never);
    }
    if let Err(e) = notification.show() {
        warn!("Failed to show notification: {}", e);
    }
}
