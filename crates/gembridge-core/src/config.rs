//! Configuration from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
/// Upper bound on the relay timeout; the stability window alone is 600s.
pub const MAX_TIMEOUT_SECS: u64 = 600;

/// Top-level GemBridge configuration shared by the relay and the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Interface the relay binds to.
    pub host: String,
    /// HTTP/WebSocket port of the relay.
    pub port: u16,
    /// Wall-clock limit for one `/api/ask` round trip.
    pub request_timeout: Duration,
    /// WebSocket URL the agent connects to.
    pub relay_url: String,
    /// Chrome remote debugging endpoint (e.g. `http://localhost:9222`).
    pub cdp_endpoint: String,
    /// Substring of the tab URL the agent attaches to.
    pub page_match: String,
    /// Optional JSON file with capture tuning (selectors, timings, noise table).
    pub capture_config_path: Option<PathBuf>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: DEFAULT_PORT,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            relay_url: format!("ws://localhost:{}/socket", DEFAULT_PORT),
            cdp_endpoint: "http://localhost:9222".into(),
            page_match: "gemini.google.com".into(),
            capture_config_path: None,
        }
    }
}

impl BridgeConfig {
    /// Create configuration from environment and defaults.
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let port = lookup("PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(defaults.port);

        let timeout_secs = match lookup("GEMBRIDGE_TIMEOUT_SECS") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) => secs.clamp(1, MAX_TIMEOUT_SECS),
                Err(_) => {
                    warn!("Ignoring invalid GEMBRIDGE_TIMEOUT_SECS={}", raw);
                    DEFAULT_TIMEOUT_SECS
                }
            },
            None => DEFAULT_TIMEOUT_SECS,
        };

        let relay_url = lookup("GEMBRIDGE_RELAY_URL")
            .unwrap_or_else(|| format!("ws://localhost:{}/socket", port));

        Self {
            host: lookup("GEMBRIDGE_HOST").unwrap_or(defaults.host),
            port,
            request_timeout: Duration::from_secs(timeout_secs),
            relay_url,
            cdp_endpoint: lookup("GEMBRIDGE_CDP_ENDPOINT").unwrap_or(defaults.cdp_endpoint),
            page_match: lookup("GEMBRIDGE_PAGE_MATCH").unwrap_or(defaults.page_match),
            capture_config_path: lookup("GEMBRIDGE_CAPTURE_CONFIG").map(PathBuf::from),
        }
    }

    /// Socket address string the relay listens on.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::from_vars(vars(&[]));
        assert_eq!(config.port, 3000);
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert_eq!(config.relay_url, "ws://localhost:3000/socket");
        assert_eq!(config.bind_addr(), "0.0.0.0:3000");
        assert!(config.capture_config_path.is_none());
    }

    #[test]
    fn test_relay_url_follows_port() {
        let config = BridgeConfig::from_vars(vars(&[("PORT", "4100")]));
        assert_eq!(config.relay_url, "ws://localhost:4100/socket");
    }

    #[test]
    fn test_timeout_clamped() {
        let config = BridgeConfig::from_vars(vars(&[("GEMBRIDGE_TIMEOUT_SECS", "5000")]));
        assert_eq!(config.request_timeout, Duration::from_secs(600));

        let config = BridgeConfig::from_vars(vars(&[("GEMBRIDGE_TIMEOUT_SECS", "0")]));
        assert_eq!(config.request_timeout, Duration::from_secs(1));

        let config = BridgeConfig::from_vars(vars(&[("GEMBRIDGE_TIMEOUT_SECS", "abc")]));
        assert_eq!(config.request_timeout, Duration::from_secs(60));
    }
}
