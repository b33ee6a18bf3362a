//! End-to-end relay tests: HTTP handlers driven through the router, agents
//! either faked in-process or connected over a real WebSocket.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use futures::{SinkExt, StreamExt};
use gembridge_core::{BridgeConfig, Error};
use gembridge_protocol::{GeminiResponse, TransportEvent};
use gembridge_server::{build_router, AgentHandle, AppState};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tower::ServiceExt;

fn state(timeout_secs: u64) -> Arc<AppState> {
    let config = BridgeConfig {
        request_timeout: Duration::from_secs(timeout_secs),
        ..Default::default()
    };
    Arc::new(AppState::new(config))
}

fn ask_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/ask")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Register an in-process agent that answers every prompt with `reply(prompt)`.
fn fake_agent(state: &Arc<AppState>, reply: fn(&str) -> GeminiResponse) {
    let (tx, mut rx) = mpsc::channel(8);
    state.relay.registry().register(AgentHandle::new(tx));
    let state = state.clone();
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if let TransportEvent::ExecutePrompt(req) = event {
                let mut resp = reply(&req.prompt);
                resp.request_id = req.request_id;
                state.relay.resolve(resp);
            }
        }
    });
}

#[tokio::test]
async fn test_missing_or_blank_prompt_is_400() {
    let state = state(5);
    for body in [r#"{}"#, r#"{"prompt": "   "}"#, "not json", r#"{"prompt": 5}"#] {
        let response = build_router(state.clone())
            .oneshot(ask_request(body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {:?}", body);
        assert!(json_body(response).await["error"].is_string());
    }
}

#[tokio::test]
async fn test_no_agent_is_503() {
    let response = build_router(state(5))
        .oneshot(ask_request(r#"{"prompt": "hello"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        json_body(response).await["error"],
        Error::NoActiveAgent.to_string()
    );
}

#[tokio::test]
async fn test_answer_through_fake_agent() {
    let state = state(5);
    fake_agent(&state, |prompt| {
        GeminiResponse::success(format!("echo: {}", prompt), None)
    });

    let response = build_router(state.clone())
        .oneshot(ask_request(r#"{"prompt": "what time is it"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["response"], "echo: what time is it");
    assert_eq!(state.relay.listener_count(), 0);
}

#[tokio::test]
async fn test_capture_failure_is_504() {
    let state = state(5);
    fake_agent(&state, |_| GeminiResponse::failure(&Error::InputNotFound, None));

    let response = build_router(state)
        .oneshot(ask_request(r#"{"prompt": "hi"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    let body = json_body(response).await;
    assert!(body["error"].as_str().unwrap().contains("Input box not found"));
}

#[tokio::test]
async fn test_repeated_timeouts_leave_no_listeners() {
    let state = state(1);
    // An agent that never answers.
    let (tx, mut rx) = mpsc::channel(16);
    state.relay.registry().register(AgentHandle::new(tx));
    tokio::spawn(async move { while rx.recv().await.is_some() {} });

    for _ in 0..3 {
        let response = build_router(state.clone())
            .oneshot(ask_request(r#"{"prompt": "slow"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }
    assert_eq!(state.relay.listener_count(), 0);
}

#[tokio::test]
async fn test_status_endpoint() {
    let state = state(42);
    let response = build_router(state.clone())
        .oneshot(Request::builder().uri("/api/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["agentConnected"], false);
    assert_eq!(body["pending"], 0);
    assert_eq!(body["timeoutSecs"], 42);
}

#[tokio::test]
async fn test_round_trip_over_websocket() {
    let state = state(5);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = build_router(state.clone());
    tokio::spawn(async move { axum::serve(listener, server).await });

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/socket", addr))
        .await
        .unwrap();
    // Wait for the registry to see the connection.
    while state.relay.registry().current().is_none() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let agent = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws.next().await {
            let Message::Text(text) = msg else { continue };
            if let Ok(TransportEvent::ExecutePrompt(req)) = TransportEvent::from_json(&text) {
                let reply = TransportEvent::GeminiResponse(GeminiResponse::success(
                    format!("socket says hi to {}", req.prompt),
                    req.request_id,
                ));
                ws.send(Message::Text(reply.to_json().unwrap().into()))
                    .await
                    .unwrap();
                break;
            }
        }
        ws.close(None).await.ok();
    });

    let response = build_router(state.clone())
        .oneshot(ask_request(r#"{"prompt": "bob"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["response"], "socket says hi to bob");
    agent.await.unwrap();

    // Disconnect clears the slot.
    for _ in 0..100 {
        if state.relay.registry().current().is_none() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(state.relay.registry().current().is_none());
}
