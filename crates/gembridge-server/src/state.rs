//! Shared application state.

use gembridge_core::BridgeConfig;

use crate::relay::Relay;

/// Shared state accessible from all route handlers.
pub struct AppState {
    pub config: BridgeConfig,
    pub relay: Relay,
}

impl AppState {
    pub fn new(config: BridgeConfig) -> Self {
        let relay = Relay::new(config.request_timeout);
        Self { config, relay }
    }
}
