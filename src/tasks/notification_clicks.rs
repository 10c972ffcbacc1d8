//! Forwards desktop notification clicks to window routing

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{effects::notification::NotificationClick, state::AppState};

pub async fn notification_click_task(
    state: Arc<AppState>,
    mut clicks: mpsc::UnboundedReceiver<NotificationClick>,
) {
    info!("Starting notification click task");

    while let Some(click) = clicks.recv().await {
        match state.handle_notification_click(&click.tag) {
            Ok(route) => debug!("Notification click routed: {:?}", route),
            Err(e) => warn!("Failed to route notification click: {}", e),
        }
    }

    debug!("Notification click channel closed");
}
