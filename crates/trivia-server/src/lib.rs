pub mod config;
pub mod error;
pub mod health;
pub mod room_manager;
pub mod session;
pub mod state;
pub mod ws;

use std::time::Duration;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use trivia_core::question::QuestionBank;

use config::ServerConfig;
use state::AppState;

/// Build the Axum router and application state from a config and a
/// question bank.
pub fn build_app(config: ServerConfig, bank: QuestionBank) -> (Router<()>, AppState) {
    let web_root = config.web_root.clone();
    let state = AppState::new(config, bank);

    let app = Router::new()
        .route("/ws", axum::routing::get(ws::ws_handler))
        .route("/healthz", axum::routing::get(health::health_check))
        .fallback_service(ServeDir::new(&web_root))
        .layer(CorsLayer::permissive())
        .with_state(state.clone());

    (app, state)
}

/// Background task that periodically removes rooms nobody has touched
/// within the idle timeout, stopping any session still running in them.
pub fn spawn_idle_reaper(state: AppState) {
    let interval = Duration::from_secs(state.config.rooms.idle_check_interval_secs);
    let max_idle = Duration::from_secs(state.config.rooms.idle_timeout_secs);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let removed = {
                let mut rooms = state.rooms.write().await;
                rooms.cleanup_idle_rooms(max_idle)
            };
            if removed > 0 {
                tracing::info!(removed, "Idle room cleanup");
            }
        }
    });
}
