//! Ghost Coach Server
//!
//! Hosts live coaching sessions behind a REST + SSE API

use anyhow::{Context, Result};
use ghost_core::CoachConfig;
use ghost_server::{api, manager, state};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;

const CONFIG_ENV: &str = "GHOST_COACH_CONFIG";

fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("ghost-coach")
                .join("config.json")
        })
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting Ghost Coach Server");

    let path = config_path();
    let config = CoachConfig::load(&path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    info!("Config: {}", path.display());

    let addr: SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("Invalid bind address: {}", config.server.bind))?;
    let demo = config.server.demo;

    // Create application state
    let state = state::AppState::new(config)?;

    if demo {
        manager::start_demo(&state).await?;
    }

    // Build the router
    let app = api::create_router(state.clone());

    info!("Server listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let shutdown = state.shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
            shutdown.cancel();
        })
        .await?;

    Ok(())
}
