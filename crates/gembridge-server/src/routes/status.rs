use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/status", get(get_status))
}

/// GET /api/status: agent liveness and pending requests.
async fn get_status(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let agent = state.relay.registry().current();
    Json(serde_json::json!({
        "agentConnected": agent.is_some(),
        "agentId": agent.map(|a| a.id),
        "pending": state.relay.listener_count(),
        "timeoutSecs": state.relay.timeout().as_secs(),
    }))
}
