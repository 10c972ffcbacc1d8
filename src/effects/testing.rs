//! Recording side effects for tests

use std::sync::{Arc, Mutex};
use clap::Parser;

use crate::{clock::ManualClock, config::Config, state::AppState};
use super::{NotificationPayload, NotificationPermission, SideEffects};

/// Wall-clock start used by state tests
pub const T0: i64 = 1_711_562_400_000;

/// App state wired to a manual clock and recording effects
pub fn harness() -> (Arc<AppState>, Arc<ManualClock>, Arc<RecordingEffects>) {
    let config = Config::try_parse_from(["surge-timer"]).unwrap();
    let clock = Arc::new(ManualClock::new(T0));
    let effects = Arc::new(RecordingEffects::new());
    let state = Arc::new(AppState::new(&config, clock.clone(), effects.clone()));
    (state, clock, effects)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EffectCall {
    PrepareAudio,
    RequestPermission,
    AcquireWakeLock,
    ReleaseWakeLock,
    StartKeepalive,
    StopKeepalive,
    PlayAlert,
    Notify(NotificationPayload),
    OpenWindow(String),
}

#[derive(Debug, Default)]
pub struct RecordingEffects {
    calls: Mutex<Vec<EffectCall>>,
    permission: Mutex<NotificationPermission>,
}

impl RecordingEffects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<EffectCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &EffectCall) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == call).count()
    }

    pub fn notifications(&self) -> Vec<NotificationPayload> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|c| match c {
                EffectCall::Notify(payload) => Some(payload.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: EffectCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl SideEffects for RecordingEffects {
    fn prepare_audio(&self) {
        self.record(EffectCall::PrepareAudio);
    }

    fn request_notification_permission(&self) {
        self.record(EffectCall::RequestPermission);
    }

    fn notification_permission(&self) -> NotificationPermission {
        *self.permission.lock().unwrap()
    }

    fn set_notification_permission(&self, permission: NotificationPermission) {
        *self.permission.lock().unwrap() = permission;
    }

    fn acquire_wake_lock(&self) {
        self.record(EffectCall::AcquireWakeLock);
    }

    fn release_wake_lock(&self) {
        self.record(EffectCall::ReleaseWakeLock);
    }

    fn start_keepalive(&self) {
        self.record(EffectCall::StartKeepalive);
    }

    fn stop_keepalive(&self) {
        self.record(EffectCall::StopKeepalive);
    }

    fn play_alert(&self) {
        self.record(EffectCall::PlayAlert);
    }

    fn notify(&self, payload: NotificationPayload) {
        self.record(EffectCall::Notify(payload));
    }

    fn open_window(&self, url: &str) {
        self.record(EffectCall::OpenWindow(url.to_string()));
    }
}
