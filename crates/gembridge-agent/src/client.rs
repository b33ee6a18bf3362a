//! Relay connection: connect, serve prompts, reconnect with backoff.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use gembridge_core::{Error, Result};
use gembridge_protocol::{GeminiResponse, LifecycleEvent, TransportEvent};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::dispatch::Dispatcher;
use crate::status::AgentStatus;

type RelaySocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Exponential reconnect delay.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: initial,
        }
    }

    /// Delay to wait now; doubles the next one up to the cap.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(30))
    }
}

pub struct AgentClient {
    relay_url: String,
    dispatcher: Dispatcher,
    backoff: Backoff,
}

impl AgentClient {
    pub fn new(relay_url: impl Into<String>, dispatcher: Dispatcher) -> Self {
        Self {
            relay_url: relay_url.into(),
            dispatcher,
            backoff: Backoff::default(),
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Stay connected forever, reconnecting after every drop or failed attempt.
    pub async fn run(&self) {
        let mut backoff = self.backoff.clone();
        loop {
            match self.connect().await {
                Ok(socket) => {
                    backoff.reset();
                    self.serve(socket).await;
                }
                Err(e) => {
                    let event = LifecycleEvent::ConnectError(e.to_string());
                    self.dispatcher
                        .status()
                        .set(AgentStatus::Error(format!("{}: {}", event.name(), e)));
                }
            }
            let delay = backoff.next_delay();
            debug!("Reconnecting in {:?}", delay);
            tokio::time::sleep(delay).await;
        }
    }

    /// One connection, served until the relay closes it.
    pub async fn run_once(&self) -> Result<()> {
        let socket = self.connect().await?;
        self.serve(socket).await;
        Ok(())
    }

    async fn connect(&self) -> Result<RelaySocket> {
        self.dispatcher.status().set(AgentStatus::Connecting);
        let (socket, _) = tokio_tungstenite::connect_async(self.relay_url.as_str())
            .await
            .map_err(|e| Error::Transport(format!("{}: {}", self.relay_url, e)))?;
        info!("{} {}", LifecycleEvent::Connect.name(), self.relay_url);
        self.dispatcher.status().set(AgentStatus::Connected);
        Ok(socket)
    }

    async fn serve(&self, socket: RelaySocket) {
        let (mut sink, mut source) = socket.split();
        let (out_tx, mut out_rx) = mpsc::channel::<GeminiResponse>(32);

        loop {
            tokio::select! {
                Some(resp) = out_rx.recv() => {
                    let frame = match TransportEvent::GeminiResponse(resp).to_json() {
                        Ok(frame) => frame,
                        Err(e) => {
                            warn!("Failed to encode response: {}", e);
                            continue;
                        }
                    };
                    if let Err(e) = sink.send(Message::Text(frame.into())).await {
                        warn!("Failed to send response: {}", e);
                        break;
                    }
                }
                msg = source.next() => match msg {
                    Some(Ok(Message::Text(text))) => self.on_frame(&text, &out_tx),
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        warn!("Relay socket error: {}", e);
                        break;
                    }
                    _ => {}
                },
            }
        }

        info!("{} {}", LifecycleEvent::Disconnect.name(), self.relay_url);
        self.dispatcher.status().set(AgentStatus::Disconnected);
    }

    fn on_frame(&self, text: &str, out_tx: &mpsc::Sender<GeminiResponse>) {
        match TransportEvent::from_json(text) {
            Ok(TransportEvent::ExecutePrompt(request)) => {
                let dispatcher = self.dispatcher.clone();
                let out_tx = out_tx.clone();
                tokio::spawn(async move {
                    let resp = dispatcher.handle(request).await;
                    if out_tx.send(resp).await.is_err() {
                        warn!("Relay connection gone; response dropped");
                    }
                });
            }
            Ok(other) => warn!("Ignoring unexpected {} event", other.name()),
            Err(e) => warn!("Dropping frame: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use gembridge_capture::{
        CaptureConfig, CaptureSession, FixtureElement, FixturePage, VirtualScheduler,
    };
    use gembridge_protocol::ExecutePrompt;
    use tokio::net::TcpListener;

    use super::*;
    use crate::status::StatusReporter;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(5));
        let delays: Vec<u64> = (0..5).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 5, 5]);
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }

    fn dispatcher() -> Dispatcher {
        let page = FixturePage::new();
        page.add(
            &[r#"div[contenteditable="true"]"#],
            FixtureElement::new("div"),
        );
        page.on_submit(|p, prompt| {
            let answer = format!("Relay answer for {} with enough text.", prompt);
            p.append_body_text(&answer);
            p.add(&[".markdown"], FixtureElement::new("div").text(answer));
        });
        let session = CaptureSession::new(
            Arc::new(page),
            Arc::new(VirtualScheduler::new()),
            CaptureConfig::default(),
        )
        .unwrap();
        Dispatcher::new(Arc::new(session), StatusReporter::new())
    }

    #[tokio::test]
    async fn test_round_trip_over_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}/socket", listener.local_addr().unwrap());

        let relay = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

            // Garbage is dropped without killing the connection.
            ws.send(Message::Text("not json".into())).await.unwrap();
            let request = TransportEvent::ExecutePrompt(ExecutePrompt {
                prompt: "pings".into(),
                request_id: Some("req-1".into()),
            });
            ws.send(Message::Text(request.to_json().unwrap().into()))
                .await
                .unwrap();

            let reply = loop {
                match ws.next().await.unwrap().unwrap() {
                    Message::Text(text) => break TransportEvent::from_json(&text).unwrap(),
                    _ => continue,
                }
            };
            ws.close(None).await.unwrap();
            reply
        });

        let client = AgentClient::new(url, dispatcher());
        client.run_once().await.unwrap();
        assert_eq!(
            client.dispatcher.status().current(),
            AgentStatus::Disconnected
        );

        match relay.await.unwrap() {
            TransportEvent::GeminiResponse(resp) => {
                assert_eq!(resp.request_id.as_deref(), Some("req-1"));
                assert_eq!(resp.text, "Relay answer for pings with enough text.");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connect_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = AgentClient::new(format!("ws://{}/socket", addr), dispatcher());
        let err = client.run_once().await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }
}
