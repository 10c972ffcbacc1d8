//! Surge Timer - A focus/break countdown daemon that survives host suspension
//!
//! This is the main entry point for the surge-timer application.

use std::sync::Arc;
use tokio::{net::TcpListener, sync::mpsc};
use tracing::info;

use surge_timer::{
    api::create_router,
    clock::SystemClock,
    config::Config,
    effects::SystemEffects,
    state::AppState,
    tasks::{notification_click_task, tick_task, wake_up_resync_task},
    utils::{runtime, shutdown_signal},
};

fn main() -> anyhow::Result<()> {
    runtime::run(serve())
}

async fn serve() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("surge_timer={},tower_http=info", config.log_level()))
        .init();

    info!("Starting surge-timer v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration: host={}, port={}, tick={}ms, app_url={}",
          config.host, config.port, config.tick_ms, config.app_url());

    // Desktop side effects; notification clicks come back over a channel
    let (click_tx, click_rx) = mpsc::unbounded_channel();
    let effects = Arc::new(SystemEffects::new(&config, click_tx));

    // Create application state
    let state = Arc::new(AppState::new(&config, Arc::new(SystemClock), effects));

    // Start background tasks
    tokio::spawn(tick_task(Arc::clone(&state)));
    tokio::spawn(wake_up_resync_task(Arc::clone(&state)));
    tokio::spawn(notification_click_task(Arc::clone(&state), click_rx));

    // Create HTTP router with all endpoints
    let app = create_router(Arc::clone(&state));

    // Bind to the specified address
    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  POST /start, /pause, /toggle, /reset - Timer controls");
    info!("  POST /visibility                     - Client returned to foreground");
    info!("  POST /notification/permission|click  - Notification handling");
    info!("  GET|POST /windows                    - Attached windows");
    info!("  GET  /status                         - Current timer status");
    info!("  GET  /events                         - Server-sent timer events");
    info!("  GET  /health                         - Health check");

    // Setup graceful shutdown
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    state.shutdown();
    info!("Server shutdown complete");
    Ok(())
}
