mod analysis;
mod config;
mod errors;
mod llm_client;
mod models;
mod routes;
mod state;
mod workflow;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Crackify API v{}", env!("CARGO_PKG_VERSION"));
    for warning in config.warnings() {
        warn!("{warning}");
    }

    let llm = LlmClient::new(
        config.anthropic_api_key.clone(),
        config.llm_max_attempts,
        config.fast_timeout,
        config.analysis_timeout,
    )?;
    info!(
        "LLM client initialized (fast: {}, deep: {}, attempts: {})",
        llm_client::FAST_MODEL,
        llm_client::DEEP_MODEL,
        config.llm_max_attempts
    );
    match config.analysis_timeout {
        Some(limit) => info!("Deep analysis bounded at {}s", limit.as_secs()),
        None => info!("Deep analysis runs without a time limit"),
    }

    let state = AppState::new(config.clone(), Arc::new(llm));
    spawn_idle_eviction(state.clone());

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the web client has a fixed host

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Sweeps abandoned sessions so their workflows and timers do not pile up.
fn spawn_idle_eviction(state: AppState) {
    let max_idle = state.config.session_idle;
    tokio::spawn(async move {
        let period = max_idle.clamp(Duration::from_secs(1), Duration::from_secs(60));
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            let evicted = state.sessions.evict_idle(max_idle).await;
            if evicted > 0 {
                info!("Evicted {evicted} idle sessions");
            }
        }
    });
}
