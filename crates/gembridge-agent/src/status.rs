//! Agent status channel.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentStatus {
    Connecting,
    Connected,
    /// A prompt is running on the page.
    Working,
    Disconnected,
    Error(String),
}

impl AgentStatus {
    /// Short label, as a toolbar badge would show it.
    pub fn badge(&self) -> &'static str {
        match self {
            Self::Connecting => "...",
            Self::Connected => "ON",
            Self::Working => "RUN",
            Self::Disconnected => "OFF",
            Self::Error(_) => "ERR",
        }
    }
}

/// Publishes status transitions to any number of watchers.
#[derive(Debug, Clone)]
pub struct StatusReporter {
    tx: Arc<watch::Sender<AgentStatus>>,
}

impl StatusReporter {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(AgentStatus::Disconnected);
        Self { tx: Arc::new(tx) }
    }

    pub fn set(&self, status: AgentStatus) {
        match &status {
            AgentStatus::Error(msg) => warn!("Agent status: {} ({})", status.badge(), msg),
            _ => info!("Agent status: {}", status.badge()),
        }
        self.tx.send_replace(status);
    }

    /// Back to `Connected`, unless the connection changed meanwhile.
    pub fn finish_work(&self) {
        self.tx.send_if_modified(|status| {
            if *status == AgentStatus::Working {
                *status = AgentStatus::Connected;
                true
            } else {
                false
            }
        });
    }

    pub fn current(&self) -> AgentStatus {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AgentStatus> {
        self.tx.subscribe()
    }
}

impl Default for StatusReporter {
    fn default() -> Self {
        Self::new()
    }
}
