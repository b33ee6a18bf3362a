//! Agent WebSocket endpoint.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use gembridge_protocol::{LifecycleEvent, TransportEvent};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::registry::AgentHandle;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/socket", get(ws_handler))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// One agent connection; the newest connection becomes the relay target.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (tx, mut outbound_rx) = mpsc::channel::<TransportEvent>(32);
    let handle = AgentHandle::new(tx);
    let conn_id = handle.id.clone();
    let registry = state.relay.registry();

    if let Some(old) = registry.register(handle) {
        info!("Agent {} replaces {}", conn_id, old.id);
    }
    info!("{}: agent {}", LifecycleEvent::Connect.name(), conn_id);

    let (mut ws_tx, mut ws_rx) = socket.split();
    loop {
        tokio::select! {
            Some(event) = outbound_rx.recv() => {
                let frame = match event.to_json() {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!("Failed to encode {}: {}", event.name(), e);
                        continue;
                    }
                };
                if let Err(e) = ws_tx.send(Message::Text(frame.into())).await {
                    warn!("Failed to send to agent {}: {}", conn_id, e);
                    break;
                }
            }
            result = ws_rx.next() => match result {
                Some(Ok(Message::Text(text))) => on_frame(&state, &conn_id, text.as_str()),
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    warn!("WebSocket error from agent {}: {}", conn_id, e);
                    break;
                }
                Some(Ok(_)) => {}
            },
        }
    }

    registry.clear(&conn_id);
    info!("{}: agent {}", LifecycleEvent::Disconnect.name(), conn_id);
}

fn on_frame(state: &AppState, conn_id: &str, text: &str) {
    match TransportEvent::from_json(text) {
        Ok(TransportEvent::GeminiResponse(resp)) => {
            debug!(
                "Response from agent {} for {:?} ({} chars)",
                conn_id,
                resp.request_id,
                resp.text.chars().count()
            );
            state.relay.resolve(resp);
        }
        Ok(other) => warn!("Ignoring {} from agent {}", other.name(), conn_id),
        Err(e) => warn!("Dropping frame from agent {}: {}", conn_id, e),
    }
}
