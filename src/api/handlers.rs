//! HTTP endpoint handlers

use std::{convert::Infallible, sync::Arc};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
};
use futures::stream::{self, Stream};
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

use crate::{
    effects::{NotificationPermission, NOTIFICATION_TAG},
    state::{ActionError, AppState, ClickRoute, ClientWindow, TimerSnapshot},
};
use super::responses::{
    ApiResponse, ClickRequest, HealthResponse, PermissionRequest, PermissionResponse,
    StatusResponse, WindowRequest,
};

fn action_response(
    action: &str,
    result: Result<TimerSnapshot, ActionError>,
) -> Result<Json<ApiResponse>, StatusCode> {
    match result {
        Ok(timer) => Ok(Json(ApiResponse::ok(format!("Timer {}", action), timer))),
        Err(ActionError::Rejected(e)) => {
            warn!("{} refused: {}", action, e);
            Err(StatusCode::CONFLICT)
        }
        Err(ActionError::Internal(e)) => {
            error!("Failed to {} timer: {}", action, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Handle POST /start - Start the countdown
pub async fn start_handler(State(state): State<Arc<AppState>>) -> Result<Json<ApiResponse>, StatusCode> {
    action_response("started", state.start())
}

/// Handle POST /pause - Pause the countdown
pub async fn pause_handler(State(state): State<Arc<AppState>>) -> Result<Json<ApiResponse>, StatusCode> {
    action_response("paused", state.pause())
}

/// Handle POST /toggle - Start when stopped, pause when running
pub async fn toggle_handler(State(state): State<Arc<AppState>>) -> Result<Json<ApiResponse>, StatusCode> {
    action_response("toggled", state.toggle())
}

/// Handle POST /reset - Restore the current phase's full duration
pub async fn reset_handler(State(state): State<Arc<AppState>>) -> Result<Json<ApiResponse>, StatusCode> {
    action_response("reset", state.reset())
}

/// Handle POST /visibility - A client came back to the foreground
pub async fn visibility_handler(State(state): State<Arc<AppState>>) -> Result<Json<ApiResponse>, StatusCode> {
    if let Err(e) = state.resync("visibility") {
        error!("Failed to resync on visibility: {}", e);
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }

    match state.snapshot() {
        Ok(timer) => Ok(Json(ApiResponse::ok("Timer resynced".to_string(), timer))),
        Err(e) => {
            error!("Failed to get timer state: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Handle POST /notification/permission - Record the user's decision
pub async fn permission_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PermissionRequest>,
) -> Json<PermissionResponse> {
    let permission = if request.granted {
        NotificationPermission::Granted
    } else {
        NotificationPermission::Denied
    };
    info!("Notification permission set to {:?}", permission);
    state.effects.set_notification_permission(permission);

    Json(PermissionResponse { permission: state.effects.notification_permission() })
}

/// Handle POST /notification/click - A client-side notification was clicked
pub async fn notification_click_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ClickRequest>,
) -> Result<Json<ClickRoute>, StatusCode> {
    let tag = request.tag.unwrap_or_else(|| NOTIFICATION_TAG.to_string());

    state.handle_notification_click(&tag).map(Json).map_err(|e| {
        error!("Failed to route notification click: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

/// Handle GET /windows - List attached windows
pub async fn list_windows_handler(State(state): State<Arc<AppState>>) -> Result<Json<Vec<ClientWindow>>, StatusCode> {
    state.list_windows().map(Json).map_err(|e| {
        error!("Failed to list windows: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

/// Handle POST /windows - Attach a window
pub async fn register_window_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<WindowRequest>,
) -> Result<Json<ClientWindow>, StatusCode> {
    state.register_window(&request.url).map(Json).map_err(|e| {
        error!("Failed to register window: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

/// Handle DELETE /windows/:id - Detach a window
pub async fn unregister_window_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> StatusCode {
    match state.unregister_window(id) {
        Ok(true) => StatusCode::NO_CONTENT,
        Ok(false) => StatusCode::NOT_FOUND,
        Err(e) => {
            error!("Failed to unregister window: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Handle POST /windows/:id/focus - A window gained focus
pub async fn focus_window_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> StatusCode {
    match state.focus_window(id) {
        Ok(true) => StatusCode::NO_CONTENT,
        Ok(false) => StatusCode::NOT_FOUND,
        Err(e) => {
            error!("Failed to focus window: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Handle GET /status - Return current timer status
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Result<Json<StatusResponse>, StatusCode> {
    let timer = match state.snapshot() {
        Ok(t) => t,
        Err(e) => {
            error!("Failed to get timer state: {}", e);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let (last_action, last_action_time) = state.get_last_action();

    Ok(Json(StatusResponse {
        timer,
        notification_permission: state.effects.notification_permission(),
        uptime: state.get_uptime(),
        port: state.port,
        host: state.host.clone(),
        last_action,
        last_action_time,
    }))
}

/// Handle GET /events - Stream timer events as server-sent events
pub async fn events_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.event_tx.subscribe();

    let events = stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let sse = Event::default().json_data(&event).unwrap_or_else(|e| {
                        Event::default().event("error").data(e.to_string())
                    });
                    return Some((Ok(sse), rx));
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Event stream lagged, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
