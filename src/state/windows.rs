//! Client windows attached to the daemon and notification click routing

use serde::{Deserialize, Serialize};

/// How long a window opened for a click has to attach before another click
/// may open a second one
pub const PENDING_OPEN_MS: i64 = 10_000;

/// A front-end window that has registered with the daemon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientWindow {
    pub id: u64,
    pub url: String,
    pub focused: bool,
}

/// What a notification click should do
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "route", rename_all = "snake_case")]
pub enum ClickRoute {
    /// A matching window already has focus; nothing to do
    AlreadyFocused { id: u64 },
    /// Bring this existing window to the front
    Focus { id: u64 },
    /// A window was opened moments ago and has not attached yet
    Opening { url: String },
    /// No window is open; open one at the app root
    Open { url: String },
}

#[derive(Debug, Default)]
pub struct WindowRegistry {
    windows: Vec<ClientWindow>,
    next_id: u64,
    /// When a click last opened a window that has not attached since
    opened_at: Option<i64>,
}

impl WindowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, url: &str) -> ClientWindow {
        self.opened_at = None;
        self.next_id += 1;
        let window = ClientWindow {
            id: self.next_id,
            url: url.to_string(),
            focused: false,
        };
        self.windows.push(window.clone());
        window
    }

    pub fn unregister(&mut self, id: u64) -> bool {
        let before = self.windows.len();
        self.windows.retain(|w| w.id != id);
        self.windows.len() != before
    }

    /// Give focus to one window; all others lose it
    pub fn focus(&mut self, id: u64) -> bool {
        if !self.windows.iter().any(|w| w.id == id) {
            return false;
        }
        for window in &mut self.windows {
            window.focused = window.id == id;
        }
        true
    }

    pub fn list(&self) -> &[ClientWindow] {
        &self.windows
    }

    /// Decide where a notification click goes
    ///
    /// Only windows that attached themselves count. A window opened here
    /// stays pending until it registers, so a second click within
    /// [`PENDING_OPEN_MS`] does not open another one, and a window that
    /// never shows up does not block later clicks.
    pub fn route_click(&mut self, scope: &str, now_ms: i64) -> ClickRoute {
        let in_scope = |w: &&ClientWindow| w.url.starts_with(scope);

        if let Some(window) = self.windows.iter().filter(in_scope).find(|w| w.focused) {
            return ClickRoute::AlreadyFocused { id: window.id };
        }

        if let Some(id) = self.windows.iter().find(in_scope).map(|w| w.id) {
            self.focus(id);
            return ClickRoute::Focus { id };
        }

        let url = scope.to_string();
        if let Some(opened_at) = self.opened_at {
            let waited = now_ms - opened_at;
            if (0..PENDING_OPEN_MS).contains(&waited) {
                return ClickRoute::Opening { url };
            }
        }

        self.opened_at = Some(now_ms);
        ClickRoute::Open { url }
    }
}
