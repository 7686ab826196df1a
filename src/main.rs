mod config;
mod gemini;
mod models;
mod pdf;
mod render;
mod routes;
mod session;
mod store;

use anyhow::Context;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

use crate::{
    config::AppConfig,
    gemini::GeminiClient,
    render::Renderer,
    routes::{router, AppState},
    session::DesignSession,
    store::{FileSlot, HistoryStore, MemorySlot},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env();

    // Init tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    tracing::info!("Using API key: {} (model {})", config.redacted_key(), config.model);
    let store = match &config.history_path {
        Some(path) => {
            tracing::info!(path = %path.display(), "History slot");
            HistoryStore::new(FileSlot::new(path.clone()))
        }
        None => {
            tracing::warn!("HISTORY_PATH is empty; history lasts for this process only");
            HistoryStore::new(MemorySlot::default())
        }
    };
    let pdf_font = match &config.pdf_font_path {
        Some(path) => {
            let bytes = std::fs::read(path).with_context(|| format!("reading PDF font {}", path.display()))?;
            tracing::info!(path = %path.display(), "PDF font");
            Some(Arc::from(bytes))
        }
        None => None,
    };
    let state = AppState {
        session: Arc::new(Mutex::new(DesignSession::open(store))),
        generator: Arc::new(GeminiClient::from_config(&config)),
        renderer: Arc::new(Renderer::new().context("loading page templates")?),
        pdf_font,
    };

    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, "Starting server");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
