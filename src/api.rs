//! Plain HTTP endpoints served alongside the WebSocket

use axum::Json;
use serde::Serialize;

pub const BANNER: &str = "WebSocket chat server is running.\n";

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { ok: true })
}

/// Body for plain GET / (no upgrade)
pub fn banner() -> &'static str {
    BANNER
}
