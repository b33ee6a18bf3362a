//! Request/response correlation between HTTP callers and the agent socket.

use std::collections::VecDeque;
use std::time::Duration;

use gembridge_core::{Error, Result};
use gembridge_protocol::{ExecutePrompt, GeminiResponse, TransportEvent};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::registry::AgentRegistry;

type Listener = (String, oneshot::Sender<Result<String>>);

pub struct Relay {
    registry: AgentRegistry,
    /// Pending listeners, oldest first.
    pending: Mutex<VecDeque<Listener>>,
    timeout: Duration,
}

/// Deregisters a listener however the waiting request ends.
struct ListenerGuard<'a> {
    relay: &'a Relay,
    id: String,
}

impl Drop for ListenerGuard<'_> {
    fn drop(&mut self) {
        self.relay.remove_listener(&self.id);
    }
}

impl Relay {
    pub fn new(timeout: Duration) -> Self {
        Self {
            registry: AgentRegistry::new(),
            pending: Mutex::new(VecDeque::new()),
            timeout,
        }
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn listener_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Send `prompt` to the active agent and wait for its answer.
    pub async fn ask(&self, prompt: &str) -> Result<String> {
        let agent = self.registry.current().ok_or(Error::NoActiveAgent)?;

        let id = uuid::Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().push_back((id.clone(), tx));
        let _guard = ListenerGuard {
            relay: self,
            id: id.clone(),
        };

        let event = TransportEvent::ExecutePrompt(ExecutePrompt {
            prompt: prompt.to_string(),
            request_id: Some(id.clone()),
        });
        // A stalled socket writer backs up the channel; the send shares the deadline.
        let exchange = async {
            if agent.tx.send(event).await.is_err() {
                warn!("Agent {} went away before request {}", agent.id, id);
                return Err(Error::NoActiveAgent);
            }
            info!("Request {} sent to agent {}", id, agent.id);
            rx.await
                .unwrap_or_else(|_| Err(Error::Transport("response listener dropped".into())))
        };

        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Request {} timed out after {:?}", id, self.timeout);
                Err(Error::RequestTimeout(self.timeout.as_secs()))
            }
        }
    }

    /// Deliver an agent response. Returns false when nobody was waiting for it.
    pub fn resolve(&self, response: GeminiResponse) -> bool {
        let listener = {
            let mut pending = self.pending.lock();
            match response.request_id.as_deref() {
                Some(id) => pending
                    .iter()
                    .position(|(pid, _)| pid == id)
                    .and_then(|pos| pending.remove(pos)),
                None => pending.pop_front(),
            }
        };

        match listener {
            Some((id, tx)) => {
                debug!("Response for request {} delivered", id);
                if tx.send(response.into_result()).is_err() {
                    debug!("Request {} already gone", id);
                }
                true
            }
            None => {
                warn!(
                    "Dropping response for unknown or stale request {:?}",
                    response.request_id
                );
                false
            }
        }
    }

    fn remove_listener(&self, id: &str) {
        self.pending.lock().retain(|(pid, _)| pid != id);
    }
}
