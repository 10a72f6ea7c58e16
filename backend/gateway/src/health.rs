//! Gateway Health API

use axum::{extract::State, Json};
use serde::Serialize;

use crate::server::GatewayState;

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub version: &'static str,
    pub default_model: String,
    pub providers: Vec<String>,
}

/// Handler for `GET /api/health`
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthReport> {
    Json(HealthReport {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        default_model: state.default_model.clone(),
        providers: state.registry.list(),
    })
}

/// Handler for `GET /`
pub async fn banner() -> &'static str {
    "Chatbox backend is running"
}
