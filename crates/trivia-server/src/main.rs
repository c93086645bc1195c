use tracing_subscriber::EnvFilter;

use trivia_core::question::QuestionBank;
use trivia_server::config::ServerConfig;
use trivia_server::{build_app, spawn_idle_reaper};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::load();
    config.validate();

    let bank = match config.questions_file {
        Some(ref path) => match QuestionBank::load(path) {
            Ok(bank) => {
                tracing::info!(path = %path, questions = bank.len(), "Loaded question bank");
                bank
            },
            Err(e) => {
                tracing::error!(path = %path, error = %e, "Failed to load question bank");
                std::process::exit(1);
            },
        },
        None => {
            let bank = QuestionBank::default();
            tracing::info!(questions = bank.len(), "Using built-in question bank");
            bank
        },
    };

    let listen_addr = config.listen_addr.clone();
    let (app, state) = build_app(config, bank);

    spawn_idle_reaper(state);

    let listener = match tokio::net::TcpListener::bind(&listen_addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(addr = %listen_addr, error = %e, "Failed to bind");
            std::process::exit(1);
        },
    };
    tracing::info!(addr = %listen_addr, "Trivia server listening");

    // Expose client addresses so the per-IP connection limit sees real IPs.
    let service = app.into_make_service_with_connect_info::<std::net::SocketAddr>();
    if let Err(e) = axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "Server error");
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        return;
    }
    tracing::info!("Shutdown signal received");
}
