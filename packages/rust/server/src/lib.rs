//! HTTP surface for manualchat using Axum.
//!
//! `POST /api/chat` runs one chat turn and streams the answer as server-sent
//! events; `GET /health` reports liveness.

pub mod routes;

use std::sync::Arc;

use axum::{
    Router,
    http::Method,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use manualchat_core::ChatService;
use manualchat_shared::{AppConfig, ManualChatError, Result};
use manualchat_upstream::CompletionService;

/// Shared state for the HTTP server.
#[derive(Clone)]
pub struct AppState {
    pub chat: ChatService,
}

/// Build the router with all routes and layers.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .allow_origin(Any);

    Router::new()
        .route("/api/chat", post(routes::chat))
        .route("/health", get(routes::health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// Bind `bind` (or the configured address) and serve until Ctrl-C.
pub async fn serve(
    config: &AppConfig,
    completion: Arc<dyn CompletionService>,
    bind: Option<&str>,
) -> Result<()> {
    let chat = ChatService::from_config(config, completion).await?;
    let app = build_router(AppState { chat });

    let addr = bind.unwrap_or(&config.server.bind);
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ManualChatError::Network(format!("failed to bind {addr}: {e}")))?;
    info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ManualChatError::Network(format!("server error: {e}")))
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutting down"),
        Err(e) => {
            tracing::warn!(error = %e, "could not install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    }
}
