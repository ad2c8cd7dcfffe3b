use std::sync::Arc;

use crate::config::ServerConfig;
use crate::registry::ConnectionRegistry;
use crate::router::MessageRouter;

/// Shared application state, built once at start-up and handed to every
/// connection handler
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: ServerConfig,
    pub registry: Arc<ConnectionRegistry>,
    pub router: MessageRouter,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let router = MessageRouter::new(registry.clone());
        Self {
            config,
            registry,
            router,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(ServerConfig::default())
    }
}
