//! GemBridge Core: relay/agent configuration and the shared error taxonomy.

pub mod config;
pub mod error;

pub use config::BridgeConfig;
pub use error::{Error, Result};
