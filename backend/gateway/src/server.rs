//! Main HTTP Gateway Server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, instrument};

use chatbox_core::DEFAULT_MODEL;
use chatbox_providers::ProviderRegistry;

use crate::{chat, health};

/// Application state shared across routes.
#[derive(Clone)]
pub struct GatewayState {
    pub registry: Arc<ProviderRegistry>,
    /// Model used when a request names none.
    pub default_model: String,
    /// Emit a comment frame after this much upstream silence.
    pub keepalive: Option<Duration>,
}

impl GatewayState {
    pub fn new(registry: ProviderRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            default_model: DEFAULT_MODEL.to_string(),
            keepalive: None,
        }
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub fn with_keepalive(mut self, keepalive: Option<Duration>) -> Self {
        self.keepalive = keepalive;
        self
    }
}

/// Build the gateway router with all routes and layers.
pub fn build_router(state: GatewayState) -> Router {
    Router::new()
        .route("/", get(health::banner))
        .route("/api/chat", post(chat::stream_chat))
        .route("/api/health", get(health::get_health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind `addr` and serve until ctrl-c.
#[instrument(skip(state))]
pub async fn start_server(addr: SocketAddr, state: GatewayState) -> Result<()> {
    let listener = TcpListener::bind(&addr).await?;
    info!("Gateway HTTP server listening on {}", listener.local_addr()?);
    serve(listener, state).await
}

/// Serve on an already-bound listener until ctrl-c.
pub async fn serve(listener: TcpListener, state: GatewayState) -> Result<()> {
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}
