//! Main application state and transition coordination

use std::{
    fmt,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};
use chrono::{DateTime, Utc};
use tokio::{
    sync::{broadcast, watch},
    time::sleep,
};
use tracing::{debug, error, info, warn};

use crate::{
    clock::Clock,
    config::Config,
    effects::{NotificationPayload, SideEffects},
};
use super::{
    events::{TimerEvent, TimerSnapshot},
    phase::TRANSITION_DELAY,
    timer_state::{Entered, TimerError, TimerState},
    windows::{ClickRoute, ClientWindow, WindowRegistry},
};

/// Why a user action did not go through
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    Rejected(TimerError),
    Internal(String),
}

impl fmt::Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionError::Rejected(e) => write!(f, "{}", e),
            ActionError::Internal(e) => f.write_str(e),
        }
    }
}

/// Shared state: the timer, its side effects and the channels that drive
/// the background tasks
///
/// All timer mutations happen under one mutex. Completion is detected and
/// the transition lock taken inside that critical section, so the tick
/// task, a resync and a direct `complete_phase` call can race freely and
/// only one of them starts a transition.
pub struct AppState {
    pub timer: Arc<Mutex<TimerState>>,
    pub clock: Arc<dyn Clock>,
    pub effects: Arc<dyn SideEffects>,
    pub windows: Arc<Mutex<WindowRegistry>>,
    /// Root URL of the application's windows
    pub app_url: String,
    pub tick_interval: Duration,
    pub resync_interval: Duration,
    pub transition_delay: Duration,
    /// Server metadata
    pub start_time: Instant,
    pub port: u16,
    pub host: String,
    /// Last action tracking
    pub last_action: Arc<Mutex<Option<String>>>,
    pub last_action_time: Arc<Mutex<Option<DateTime<Utc>>>>,
    /// Events for attached clients
    pub event_tx: broadcast::Sender<TimerEvent>,
    /// Whether the countdown is running; drives the tick task
    pub running_tx: watch::Sender<bool>,
    /// Keep the receiver alive to prevent channel closure
    pub _running_rx: watch::Receiver<bool>,
}

impl AppState {
    pub fn new(config: &Config, clock: Arc<dyn Clock>, effects: Arc<dyn SideEffects>) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        let (running_tx, running_rx) = watch::channel(false);

        Self {
            timer: Arc::new(Mutex::new(TimerState::new())),
            clock,
            effects,
            windows: Arc::new(Mutex::new(WindowRegistry::new())),
            app_url: config.app_url(),
            tick_interval: config.tick_interval(),
            resync_interval: config.resync_interval(),
            transition_delay: TRANSITION_DELAY,
            start_time: Instant::now(),
            port: config.port,
            host: config.host.clone(),
            last_action: Arc::new(Mutex::new(None)),
            last_action_time: Arc::new(Mutex::new(None)),
            event_tx,
            running_tx,
            _running_rx: running_rx,
        }
    }

    /// Get a snapshot of the timer
    pub fn snapshot(&self) -> Result<TimerSnapshot, String> {
        self.timer
            .lock()
            .map(|timer| TimerSnapshot::from(&*timer))
            .map_err(|e| format!("Failed to lock timer state: {}", e))
    }

    pub fn start(self: &Arc<Self>) -> Result<TimerSnapshot, ActionError> {
        self.user_action("start", |timer, now| timer.start(now))
    }

    pub fn pause(self: &Arc<Self>) -> Result<TimerSnapshot, ActionError> {
        self.user_action("pause", |timer, now| timer.pause(now))
    }

    pub fn toggle(self: &Arc<Self>) -> Result<TimerSnapshot, ActionError> {
        self.user_action("toggle", |timer, now| timer.toggle(now))
    }

    pub fn reset(self: &Arc<Self>) -> Result<TimerSnapshot, ActionError> {
        self.user_action("reset", |timer, _| timer.reset().map(Some))
    }

    /// Periodic tick: reconcile the countdown against its deadline
    pub fn on_tick(self: &Arc<Self>) -> Result<Option<Entered>, String> {
        self.reconcile("tick")
    }

    /// Reconcile right away because the host came back to the foreground
    pub fn resync(self: &Arc<Self>, source: &str) -> Result<Option<Entered>, String> {
        debug!("Resync requested by {}", source);
        self.reconcile(source)
    }

    /// Complete the current phase now
    ///
    /// Returns `false` when a transition is already in flight; the call is
    /// then dropped rather than queued.
    pub fn complete_phase(self: &Arc<Self>) -> Result<bool, String> {
        let entered = self.with_timer(|timer| timer.complete_phase())?;
        match entered {
            Some(entered) => {
                self.enter(entered);
                self.publish_snapshot();
                Ok(true)
            }
            None => {
                debug!("Transition already in flight, dropping completion");
                Ok(false)
            }
        }
    }

    /// Swap in the next phase once the presentation delay is over
    pub fn commit_transition(&self) -> Result<Option<Entered>, String> {
        let entered = self.with_timer(|timer| timer.commit_transition())?;
        if let Some(entered) = entered {
            self.enter_committed(entered);
            self.publish_snapshot();
        }
        Ok(entered)
    }

    /// Release everything held for a running timer
    pub fn shutdown(&self) {
        info!("Releasing wake-lock and keepalive");
        self.effects.release_wake_lock();
        self.effects.stop_keepalive();
        self.set_running(false);
    }

    /// Route a click on a completion notification to a window
    pub fn handle_notification_click(&self, tag: &str) -> Result<ClickRoute, String> {
        self.send_event(TimerEvent::NotificationDismissed { tag: tag.to_string() });

        let route = self
            .windows
            .lock()
            .map_err(|e| format!("Failed to lock window registry: {}", e))?
            .route_click(&self.app_url, self.clock.now_ms());

        match &route {
            ClickRoute::AlreadyFocused { id } => {
                debug!("Window {} already focused", id);
            }
            ClickRoute::Focus { id } => {
                info!("Focusing window {}", id);
                self.send_event(TimerEvent::FocusWindow { id: *id });
            }
            ClickRoute::Opening { url } => {
                debug!("Window for {} is still opening", url);
            }
            ClickRoute::Open { url } => {
                info!("No window attached, opening {}", url);
                self.effects.open_window(url);
                self.send_event(TimerEvent::OpenWindow { url: url.clone() });
            }
        }
        Ok(route)
    }

    pub fn register_window(&self, url: &str) -> Result<ClientWindow, String> {
        let window = self.lock_windows()?.register(url);
        info!("Window {} attached at {}", window.id, window.url);
        Ok(window)
    }

    pub fn unregister_window(&self, id: u64) -> Result<bool, String> {
        Ok(self.lock_windows()?.unregister(id))
    }

    pub fn focus_window(&self, id: u64) -> Result<bool, String> {
        Ok(self.lock_windows()?.focus(id))
    }

    pub fn list_windows(&self) -> Result<Vec<ClientWindow>, String> {
        Ok(self.lock_windows()?.list().to_vec())
    }

    /// Calculate server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        let duration = self.start_time.elapsed();
        let hours = duration.as_secs() / 3600;
        let minutes = (duration.as_secs() % 3600) / 60;
        let seconds = duration.as_secs() % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }

    /// Get last action information
    pub fn get_last_action(&self) -> (Option<String>, Option<DateTime<Utc>>) {
        let last_action = self.last_action.lock().ok().and_then(|a| a.clone());
        let last_action_time = self.last_action_time.lock().ok().and_then(|t| *t);
        (last_action, last_action_time)
    }

    fn user_action<F>(self: &Arc<Self>, action: &str, op: F) -> Result<TimerSnapshot, ActionError>
    where
        F: FnOnce(&mut TimerState, i64) -> Result<Option<Entered>, TimerError>,
    {
        let now = self.clock.now_ms();
        let (entered, snapshot) = {
            let mut timer = self
                .timer
                .lock()
                .map_err(|e| ActionError::Internal(format!("Failed to lock timer state: {}", e)))?;
            let entered = op(&mut timer, now).map_err(|e| {
                debug!("Refused {}: {}", action, e);
                ActionError::Rejected(e)
            })?;
            (entered, TimerSnapshot::from(&*timer))
        };

        info!("Timer {} ({} remaining)", action, snapshot.display);
        self.record_action(action);
        if let Some(entered) = entered {
            self.enter(entered);
        }
        self.send_event(TimerEvent::Snapshot(snapshot.clone()));
        Ok(snapshot)
    }

    fn reconcile(self: &Arc<Self>, source: &str) -> Result<Option<Entered>, String> {
        let now = self.clock.now_ms();
        let (entered, snapshot) = self.with_timer(|timer| {
            let entered = timer.tick(now);
            (entered, TimerSnapshot::from(&*timer))
        })?;

        if let Some(entered) = entered {
            info!("Phase completion observed by {}", source);
            self.enter(entered);
        }
        if entered.is_some() || snapshot.running {
            self.send_event(TimerEvent::Snapshot(snapshot));
        }
        Ok(entered)
    }

    /// Run the entry actions of a newly entered state
    fn enter(self: &Arc<Self>, entered: Entered) {
        match entered {
            Entered::Running => {
                self.effects.prepare_audio();
                self.effects.request_notification_permission();
                self.effects.acquire_wake_lock();
                self.effects.start_keepalive();
                self.set_running(true);
            }
            Entered::Standby => {
                self.set_running(false);
                self.effects.release_wake_lock();
                self.effects.stop_keepalive();
            }
            Entered::Transitioning { next } => {
                info!("Phase complete, switching to {} in {:?}", next, self.transition_delay);
                self.set_running(false);
                self.effects.play_alert();
                self.effects.notify(NotificationPayload::for_next_phase(next));
                self.effects.release_wake_lock();
                self.effects.stop_keepalive();
                self.send_event(TimerEvent::TransitionStarted { next });
                self.schedule_commit();
            }
            Entered::Committed { .. } => self.enter_committed(entered),
        }
    }

    fn enter_committed(&self, entered: Entered) {
        if let Entered::Committed { phase } = entered {
            info!("{} phase ready, waiting for start", phase);
            self.send_event(TimerEvent::PhaseCommitted { phase });
        }
    }

    fn schedule_commit(self: &Arc<Self>) {
        let state = Arc::clone(self);
        let delay = self.transition_delay;
        tokio::spawn(async move {
            sleep(delay).await;
            if let Err(e) = state.commit_transition() {
                error!("Failed to commit phase transition: {}", e);
            }
        });
    }

    fn with_timer<T>(&self, f: impl FnOnce(&mut TimerState) -> T) -> Result<T, String> {
        let mut timer = self
            .timer
            .lock()
            .map_err(|e| format!("Failed to lock timer state: {}", e))?;
        Ok(f(&mut timer))
    }

    fn lock_windows(&self) -> Result<std::sync::MutexGuard<'_, WindowRegistry>, String> {
        self.windows
            .lock()
            .map_err(|e| format!("Failed to lock window registry: {}", e))
    }

    fn set_running(&self, running: bool) {
        if let Err(e) = self.running_tx.send(running) {
            warn!("Failed to send running state: {}", e);
        }
    }

    fn publish_snapshot(&self) {
        match self.snapshot() {
            Ok(snapshot) => self.send_event(TimerEvent::Snapshot(snapshot)),
            Err(e) => warn!("{}", e),
        }
    }

    fn send_event(&self, event: TimerEvent) {
        // No subscribers is the normal case when no client is attached
        let _ = self.event_tx.send(event);
    }

    fn record_action(&self, action: &str) {
        if let Ok(mut last_action) = self.last_action.lock() {
            *last_action = Some(action.to_string());
        }
        if let Ok(mut last_time) = self.last_action_time.lock() {
            *last_time = Some(Utc::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        effects::testing::{harness as setup, EffectCall},
        state::{phase::{BREAK_TIME, FOCUS_TIME}, Phase, Status},
    };

    /// Let the delayed commit fire
    async fn wait_out_transition() {
        sleep(TRANSITION_DELAY + Duration::from_millis(10)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn focus_phase_runs_to_break() {
        let (state, clock, effects) = setup();
        state.start().unwrap();
        assert_eq!(effects.count(&EffectCall::AcquireWakeLock), 1);
        assert_eq!(effects.count(&EffectCall::StartKeepalive), 1);
        assert_eq!(effects.count(&EffectCall::PrepareAudio), 1);
        assert!(*state.running_tx.borrow());

        clock.advance(Duration::from_secs(FOCUS_TIME));
        let entered = state.on_tick().unwrap();
        assert_eq!(entered, Some(Entered::Transitioning { next: Phase::Break }));

        let snapshot = state.snapshot().unwrap();
        assert_eq!(snapshot.status, Status::Transitioning);
        assert!(!snapshot.running);
        assert_eq!(effects.count(&EffectCall::PlayAlert), 1);
        assert_eq!(effects.count(&EffectCall::ReleaseWakeLock), 1);
        assert_eq!(effects.count(&EffectCall::StopKeepalive), 1);
        let notifications = effects.notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0], NotificationPayload::for_next_phase(Phase::Break));

        wait_out_transition().await;

        let snapshot = state.snapshot().unwrap();
        assert_eq!(snapshot.phase, Phase::Break);
        assert_eq!(snapshot.remaining_seconds, BREAK_TIME);
        assert!(!snapshot.running);
        assert!(!snapshot.transitioning);
        assert_eq!(snapshot.sessions_completed, 1);
        assert!(!*state.running_tx.borrow());
    }

    #[tokio::test(start_paused = true)]
    async fn commit_waits_for_the_full_delay() {
        let (state, _clock, _effects) = setup();
        state.complete_phase().unwrap();

        sleep(TRANSITION_DELAY - Duration::from_millis(100)).await;
        assert!(state.snapshot().unwrap().transitioning);

        sleep(Duration::from_millis(200)).await;
        assert_eq!(state.snapshot().unwrap().phase, Phase::Break);
    }

    #[tokio::test(start_paused = true)]
    async fn double_completion_fires_once() {
        let (state, _clock, effects) = setup();
        state.start().unwrap();

        assert!(state.complete_phase().unwrap());
        assert!(!state.complete_phase().unwrap());

        wait_out_transition().await;

        let snapshot = state.snapshot().unwrap();
        assert_eq!(snapshot.phase, Phase::Break);
        assert_eq!(effects.count(&EffectCall::PlayAlert), 1);
        assert_eq!(effects.notifications().len(), 1);

        // Only one phase swap happened
        sleep(TRANSITION_DELAY * 2).await;
        assert_eq!(state.snapshot().unwrap().phase, Phase::Break);
    }

    #[tokio::test(start_paused = true)]
    async fn resync_during_transition_is_ignored() {
        let (state, clock, effects) = setup();
        state.start().unwrap();
        clock.advance(Duration::from_secs(FOCUS_TIME + 30));

        assert!(state.resync("visibility").unwrap().is_some());
        assert_eq!(state.resync("visibility").unwrap(), None);
        assert_eq!(state.on_tick().unwrap(), None);

        wait_out_transition().await;

        assert_eq!(effects.count(&EffectCall::PlayAlert), 1);
        assert_eq!(effects.notifications().len(), 1);
        let snapshot = state.snapshot().unwrap();
        assert_eq!(snapshot.phase, Phase::Break);
        assert_eq!(snapshot.remaining_seconds, BREAK_TIME);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_and_resume() {
        let (state, clock, effects) = setup();
        state.start().unwrap();
        clock.advance(Duration::from_secs(10));

        let snapshot = state.pause().unwrap();
        assert_eq!(snapshot.remaining_seconds, FOCUS_TIME - 10);
        assert_eq!(effects.count(&EffectCall::ReleaseWakeLock), 1);
        assert!(!*state.running_tx.borrow());

        clock.advance(Duration::from_secs(120));
        state.start().unwrap();
        clock.advance(Duration::from_secs(5));
        state.on_tick().unwrap();
        assert_eq!(state.snapshot().unwrap().remaining_seconds, FOCUS_TIME - 15);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_while_running() {
        let (state, clock, effects) = setup();
        state.start().unwrap();
        clock.advance(Duration::from_secs(300));
        state.on_tick().unwrap();

        let snapshot = state.reset().unwrap();
        assert!(!snapshot.running);
        assert_eq!(snapshot.deadline, None);
        assert_eq!(snapshot.remaining_seconds, FOCUS_TIME);
        assert_eq!(effects.count(&EffectCall::StopKeepalive), 1);
        assert_eq!(state.get_last_action().0.as_deref(), Some("reset"));
    }

    #[tokio::test(start_paused = true)]
    async fn user_actions_rejected_while_transitioning() {
        let (state, _clock, _effects) = setup();
        state.complete_phase().unwrap();

        assert_eq!(state.start(), Err(ActionError::Rejected(TimerError::Transitioning)));
        assert_eq!(state.reset(), Err(ActionError::Rejected(TimerError::Transitioning)));

        wait_out_transition().await;
        assert!(state.start().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn suspended_host_catches_up_on_resync() {
        let (state, clock, _effects) = setup();
        state.start().unwrap();

        // Host sleeps through most of the phase without a single tick
        clock.advance(Duration::from_secs(1000));
        assert_eq!(state.resync("wake").unwrap(), None);
        assert_eq!(state.snapshot().unwrap().remaining_seconds, FOCUS_TIME - 1000);
    }

    #[tokio::test(start_paused = true)]
    async fn events_are_broadcast() {
        let (state, _clock, _effects) = setup();
        let mut events = state.event_tx.subscribe();

        state.complete_phase().unwrap();
        assert_eq!(
            events.recv().await.unwrap(),
            TimerEvent::TransitionStarted { next: Phase::Break }
        );
        assert!(matches!(events.recv().await.unwrap(), TimerEvent::Snapshot(_)));

        assert_eq!(
            events.recv().await.unwrap(),
            TimerEvent::PhaseCommitted { phase: Phase::Break }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn notification_click_opens_then_focuses() {
        let (state, _clock, effects) = setup();

        let route = state.handle_notification_click("pomodoro-alert").unwrap();
        assert!(matches!(route, ClickRoute::Open { .. }));
        assert_eq!(
            effects.count(&EffectCall::OpenWindow(state.app_url.clone())),
            1
        );

        let route = state.handle_notification_click("pomodoro-alert").unwrap();
        assert!(matches!(route, ClickRoute::Opening { .. }));
        assert_eq!(effects.count(&EffectCall::OpenWindow(state.app_url.clone())), 1);

        let window = state.register_window(&state.app_url).unwrap();
        let route = state.handle_notification_click("pomodoro-alert").unwrap();
        assert_eq!(route, ClickRoute::Focus { id: window.id });
    }

    #[tokio::test(start_paused = true)]
    async fn click_reopens_after_the_window_closes() {
        let (state, clock, effects) = setup();
        let url = state.app_url.clone();

        state.handle_notification_click("pomodoro-alert").unwrap();
        let window = state.register_window(&url).unwrap();
        clock.advance(Duration::from_secs(60));
        state.unregister_window(window.id).unwrap();

        let route = state.handle_notification_click("pomodoro-alert").unwrap();
        assert_eq!(route, ClickRoute::Open { url: url.clone() });
        assert_eq!(effects.count(&EffectCall::OpenWindow(url)), 2);
        assert!(state.list_windows().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_releases_resources() {
        let (state, _clock, effects) = setup();
        state.start().unwrap();
        state.shutdown();
        assert_eq!(effects.count(&EffectCall::ReleaseWakeLock), 1);
        assert_eq!(effects.count(&EffectCall::StopKeepalive), 1);
        assert!(!*state.running_tx.borrow());
    }
}
