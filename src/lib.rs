// Public API for integration tests and the server binary

pub mod api;
pub mod config;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod router;
pub mod state;
pub mod ws;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;

/// Build the HTTP + WebSocket router
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(ws::root_handler))
        .route("/ws", get(ws::ws_handler))
        .route("/health", get(api::health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
