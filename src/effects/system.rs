//! Side effects against the real desktop

use tokio::{process::Command, sync::mpsc};
use tracing::{debug, info, warn};

use crate::config::Config;
use super::{
    audio::AudioOutput,
    notification::{DesktopNotifier, NotificationClick},
    wake_lock::WakeLockSlot,
    NotificationPayload, NotificationPermission, SideEffects,
};

const APP_NAME: &str = "surge-timer";

/// Audio, notifications, wake-lock and window opening for the daemon
#[derive(Debug)]
pub struct SystemEffects {
    audio: Option<AudioOutput>,
    wake_lock: Option<WakeLockSlot>,
    notifier: DesktopNotifier,
    opener: String,
}

impl SystemEffects {
    pub fn new(config: &Config, clicks: mpsc::UnboundedSender<NotificationClick>) -> Self {
        let audio = (!config.no_audio).then(|| AudioOutput::new(&config.audio_player));
        let wake_lock =
            (!config.no_wake_lock).then(|| WakeLockSlot::new(&config.inhibit_command, APP_NAME));

        Self {
            audio,
            wake_lock,
            notifier: DesktopNotifier::new(APP_NAME, !config.no_notifications, clicks),
            opener: config.open_command.clone(),
        }
    }
}

impl SideEffects for SystemEffects {
    fn prepare_audio(&self) {
        if let Some(audio) = &self.audio {
            audio.prepare();
        }
    }

    fn request_notification_permission(&self) {
        // Fire and forget; the answer lands in the notifier
        let _ = self.notifier.request_permission();
    }

    fn notification_permission(&self) -> NotificationPermission {
        self.notifier.permission()
    }

    fn set_notification_permission(&self, permission: NotificationPermission) {
        self.notifier.set_permission(permission);
    }

    fn acquire_wake_lock(&self) {
        if let Some(lock) = &self.wake_lock {
            lock.acquire();
        }
    }

    fn release_wake_lock(&self) {
        if let Some(lock) = &self.wake_lock {
            lock.release();
        }
    }

    fn start_keepalive(&self) {
        if let Some(audio) = &self.audio {
            audio.start_keepalive();
        }
    }

    fn stop_keepalive(&self) {
        if let Some(audio) = &self.audio {
            audio.stop_keepalive();
        }
    }

    fn play_alert(&self) {
        if let Some(audio) = &self.audio {
            audio.play_alert();
        }
    }

    fn notify(&self, payload: NotificationPayload) {
        self.notifier.notify(payload);
    }

    fn open_window(&self, url: &str) {
        let opener = self.opener.clone();
        let url = url.to_string();
        tokio::spawn(async move {
            if let Err(e) = open_url(&opener, &url).await {
                warn!("{}", e);
            }
        });
    }
}

/// Open a URL with the desktop's default handler
pub async fn open_url(opener: &str, url: &str) -> Result<(), String> {
    debug!("Opening {} with {}", url, opener);

    let output = Command::new(opener)
        .arg(url)
        .output()
        .await
        .map_err(|e| format!("Failed to execute {}: {}", opener, e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("{} failed: {}", opener, stderr));
    }

    info!("Opened new window at {}", url);
    Ok(())
}
