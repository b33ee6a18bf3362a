//! Single-slot registry of the active agent connection.

use gembridge_protocol::TransportEvent;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Outbound side of one agent socket.
#[derive(Debug, Clone)]
pub struct AgentHandle {
    pub id: String,
    pub tx: mpsc::Sender<TransportEvent>,
}

impl AgentHandle {
    pub fn new(tx: mpsc::Sender<TransportEvent>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tx,
        }
    }
}

#[derive(Debug, Default)]
pub struct AgentRegistry {
    slot: RwLock<Option<AgentHandle>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `handle` the target; returns the connection it displaced.
    pub fn register(&self, handle: AgentHandle) -> Option<AgentHandle> {
        info!("Agent {} registered", handle.id);
        self.slot.write().replace(handle)
    }

    /// Clear the slot only if it still holds `id`.
    pub fn clear(&self, id: &str) -> bool {
        let mut slot = self.slot.write();
        if slot.as_ref().is_some_and(|h| h.id == id) {
            *slot = None;
            info!("Agent {} cleared", id);
            true
        } else {
            debug!("Stale disconnect from {} ignored", id);
            false
        }
    }

    pub fn current(&self) -> Option<AgentHandle> {
        self.slot.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> AgentHandle {
        let (tx, _rx) = mpsc::channel(1);
        AgentHandle::new(tx)
    }

    #[test]
    fn test_newer_connection_wins() {
        let registry = AgentRegistry::new();
        let first = handle();
        let second = handle();

        assert!(registry.register(first.clone()).is_none());
        let displaced = registry.register(second.clone()).unwrap();
        assert_eq!(displaced.id, first.id);
        assert_eq!(registry.current().unwrap().id, second.id);
    }

    #[test]
    fn test_stale_clear_keeps_newer_agent() {
        let registry = AgentRegistry::new();
        let first = handle();
        let second = handle();
        registry.register(first.clone());
        registry.register(second.clone());

        assert!(!registry.clear(&first.id));
        assert_eq!(registry.current().unwrap().id, second.id);

        assert!(registry.clear(&second.id));
        assert!(registry.current().is_none());
    }
}
