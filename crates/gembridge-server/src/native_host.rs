//! Native messaging host: lets the browser extension start the relay.
//!
//! stdout carries frames, so nothing else may be written to it.

use std::process::{Command, Stdio};

use gembridge_core::{Error, Result};
use gembridge_protocol::native::{read_frame, write_frame};
use gembridge_protocol::{HostReply, HostRequest};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{info, warn};

pub const START_SERVER: &str = "start_server";
pub const SERVER_STARTED: &str = "server_started";

/// Starts the relay process.
pub trait Launcher: Send + Sync {
    fn start_relay(&self) -> Result<()>;
}

/// Re-executes the current binary with `serve`, detached from the host.
#[derive(Debug, Default)]
pub struct ProcessLauncher;

impl Launcher for ProcessLauncher {
    fn start_relay(&self) -> Result<()> {
        let exe = std::env::current_exe()?;
        let child = Command::new(exe)
            .arg("serve")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        info!("Relay process spawned (pid {})", child.id());
        Ok(())
    }
}

/// Handle one request.
pub fn handle_request(request: &serde_json::Value, launcher: &dyn Launcher) -> HostReply {
    let parsed = serde_json::from_value::<HostRequest>(request.clone());
    match parsed {
        Ok(req) if req.action == START_SERVER => match launcher.start_relay() {
            Ok(()) => HostReply::ok(SERVER_STARTED),
            Err(e) => {
                warn!("Failed to start relay: {}", e);
                HostReply::error(e.to_string())
            }
        },
        Ok(req) => HostReply::error(format!("unknown action: {}", req.action)),
        Err(e) => HostReply::error(format!("bad request: {}", e)),
    }
}

/// Serve frames until the browser closes stdin.
pub async fn run<R, W>(reader: &mut R, writer: &mut W, launcher: &dyn Launcher) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    info!("Native host started");
    loop {
        let request: serde_json::Value = match read_frame(reader).await {
            Ok(Some(request)) => request,
            Ok(None) => break,
            // The stream position is unknown after a bad frame; report and stop.
            Err(e @ Error::Protocol(_)) => {
                warn!("Native frame rejected: {}", e);
                write_frame(writer, &HostReply::error(e.to_string())).await?;
                return Err(e);
            }
            Err(e) => return Err(e),
        };
        info!("Received: {}", request);
        write_frame(writer, &handle_request(&request, launcher)).await?;
    }
    info!("Native host stdin closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use gembridge_protocol::native::encode_frame;
    use gembridge_protocol::MAX_FRAME_LEN;

    use super::*;

    #[derive(Default)]
    struct CountingLauncher {
        starts: AtomicUsize,
    }

    impl Launcher for CountingLauncher {
        fn start_relay(&self) -> Result<()> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    async fn replies(out: &[u8]) -> Vec<HostReply> {
        let mut reader = out;
        let mut replies = Vec::new();
        while let Some(reply) = read_frame::<_, HostReply>(&mut reader).await.unwrap() {
            replies.push(reply);
        }
        replies
    }

    #[tokio::test]
    async fn test_start_and_unknown_actions() {
        let mut input = encode_frame(&serde_json::json!({ "action": "start_server" })).unwrap();
        input.extend(encode_frame(&serde_json::json!({ "action": "reboot" })).unwrap());
        input.extend(encode_frame(&serde_json::json!({ "nothing": 1 })).unwrap());

        let launcher = CountingLauncher::default();
        let mut reader: &[u8] = &input;
        let mut out = Vec::new();
        run(&mut reader, &mut out, &launcher).await.unwrap();

        let replies = replies(&out).await;
        assert_eq!(replies.len(), 3);
        assert_eq!(replies[0], HostReply::ok("server_started"));
        assert_eq!(replies[1].status, "error");
        assert_eq!(replies[1].error.as_deref(), Some("unknown action: reboot"));
        assert_eq!(replies[2].status, "error");
        assert_eq!(launcher.starts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_oversized_frame_stops_host() {
        let input = ((MAX_FRAME_LEN + 1) as u32).to_le_bytes();
        let launcher = CountingLauncher::default();
        let mut reader: &[u8] = &input;
        let mut out = Vec::new();

        let err = run(&mut reader, &mut out, &launcher).await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
        assert_eq!(replies(&out).await[0].status, "error");
    }
}
