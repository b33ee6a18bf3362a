//! CDP WebSocket connection to a single page target.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use gembridge_core::{Error, Result};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace, warn};

use super::protocol::{CdpRequest, CdpResponse};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;
type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value>>>>>;

const CALL_TIMEOUT: Duration = Duration::from_secs(30);

pub struct CdpConnection {
    ws_tx: tokio::sync::Mutex<WsSink>,
    request_id: AtomicU64,
    pending: Pending,
    recv_task: tokio::task::JoinHandle<()>,
}

impl CdpConnection {
    pub async fn connect(ws_url: &str) -> Result<Self> {
        let (ws_stream, _) = tokio_tungstenite::connect_async(ws_url)
            .await
            .map_err(|e| Error::Transport(format!("CDP connect {}: {}", ws_url, e)))?;
        let (sink, source) = ws_stream.split();

        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let recv_task = {
            let pending = pending.clone();
            tokio::spawn(async move { Self::receive_loop(source, pending).await })
        };

        debug!("CDP connected to {}", ws_url);
        Ok(Self {
            ws_tx: tokio::sync::Mutex::new(sink),
            request_id: AtomicU64::new(1),
            pending,
            recv_task,
        })
    }

    async fn receive_loop(mut source: WsSource, pending: Pending) {
        while let Some(msg) = source.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    trace!("CDP recv: {}", text);
                    let resp = match serde_json::from_str::<CdpResponse>(&text) {
                        Ok(resp) => resp,
                        Err(e) => {
                            warn!("Failed to parse CDP message: {}", e);
                            continue;
                        }
                    };
                    let Some(id) = resp.id else {
                        continue;
                    };
                    if let Some(tx) = pending.lock().remove(&id) {
                        let result = match resp.error {
                            Some(err) => Err(Error::Page(format!(
                                "CDP error {}: {}",
                                err.code, err.message
                            ))),
                            None => Ok(resp.result.unwrap_or(Value::Null)),
                        };
                        let _ = tx.send(result);
                    }
                }
                Ok(Message::Close(_)) => {
                    debug!("CDP socket closed");
                    break;
                }
                Err(e) => {
                    warn!("CDP socket error: {}", e);
                    break;
                }
                _ => {}
            }
        }
        // Fail anything still waiting.
        pending.lock().clear();
    }

    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        let json = serde_json::to_string(&CdpRequest {
            id,
            method: method.to_string(),
            params,
        })?;
        trace!("CDP send: {}", json);

        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        let sent = self.ws_tx.lock().await.send(Message::Text(json.into())).await;
        if let Err(e) = sent {
            self.pending.lock().remove(&id);
            return Err(Error::Transport(format!("CDP send: {}", e)));
        }

        match tokio::time::timeout(CALL_TIMEOUT, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::Transport("CDP connection closed".into())),
            Err(_) => {
                self.pending.lock().remove(&id);
                Err(Error::Page(format!("{} timed out", method)))
            }
        }
    }

    /// `Runtime.evaluate` by value, awaiting promises. Exceptions become page errors.
    pub async fn evaluate(&self, expression: &str) -> Result<Value> {
        let result = self
            .call(
                "Runtime.evaluate",
                Some(json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                })),
            )
            .await?;

        if let Some(exception) = result.get("exceptionDetails") {
            let text = exception["exception"]["description"]
                .as_str()
                .or_else(|| exception["text"].as_str())
                .unwrap_or("Unknown error");
            return Err(Error::Page(text.to_string()));
        }
        Ok(result["result"]["value"].clone())
    }

    pub fn is_closed(&self) -> bool {
        self.recv_task.is_finished()
    }
}

impl Drop for CdpConnection {
    fn drop(&mut self) {
        self.recv_task.abort();
    }
}
