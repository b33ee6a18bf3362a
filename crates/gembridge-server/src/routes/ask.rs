//! Prompt relay endpoint.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use gembridge_core::Error;
use serde::Deserialize;
use tracing::{info, warn};

use super::error_response;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct AskRequest {
    #[serde(default)]
    prompt: Option<String>,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/ask", post(ask))
}

/// POST /api/ask: forward `{prompt}` to the agent, answer `{response}`.
async fn ask(State(state): State<Arc<AppState>>, body: Bytes) -> impl IntoResponse {
    // Parsed by hand so malformed bodies get the same 400 shape as a missing prompt.
    let prompt = match serde_json::from_slice::<AskRequest>(&body) {
        Ok(AskRequest {
            prompt: Some(prompt),
        }) if !prompt.trim().is_empty() => prompt,
        Ok(_) => return error_response(&Error::Protocol("prompt is required".into())),
        Err(e) => return error_response(&Error::Protocol(format!("invalid JSON body: {}", e))),
    };

    info!("Relaying prompt ({} chars)", prompt.chars().count());
    match state.relay.ask(&prompt).await {
        Ok(response) => (
            StatusCode::OK,
            Json(serde_json::json!({ "response": response })),
        ),
        Err(e) => {
            warn!("Ask failed: {}", e);
            error_response(&e)
        }
    }
}
