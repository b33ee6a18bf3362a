//! GemBridge: HTTP relay in front of a browser-resident chat page.

use std::sync::Arc;

use gembridge_agent::{AgentClient, Dispatcher, StatusReporter};
use gembridge_capture::{CaptureConfig, CaptureSession, CdpAttacher, ReattachingPage, TokioScheduler};
use gembridge_core::BridgeConfig;
use gembridge_server::native_host::{self, ProcessLauncher};
use gembridge_server::{build_router, AppState};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("serve");

    // stdout is the frame channel for the native host.
    if command == "native-host" {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter())
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter()).init();
    }

    let config = BridgeConfig::from_env();

    match command {
        "serve" => serve(config).await,
        "agent" => agent(config).await,
        "native-host" => {
            let mut stdin = tokio::io::stdin();
            let mut stdout = tokio::io::stdout();
            native_host::run(&mut stdin, &mut stdout, &ProcessLauncher).await?;
            Ok(())
        }
        "--help" | "-h" | "help" => {
            println!("GemBridge: HTTP relay for a browser chat page");
            println!();
            println!("Usage: gembridge [command]");
            println!();
            println!("Commands:");
            println!("  (none) | serve           Start the relay server");
            println!("  agent                    Attach to the chat tab over CDP and serve prompts");
            println!("  native-host              Run as the browser's native messaging host");
            println!("  help                     Show this help message");
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}. Use 'gembridge help' for usage.", other);
            std::process::exit(1);
        }
    }
}

async fn serve(config: BridgeConfig) -> anyhow::Result<()> {
    let addr = config.bind_addr();
    info!(
        "Request timeout: {}s",
        config.request_timeout.as_secs()
    );

    let state = Arc::new(AppState::new(config));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("GemBridge relay listening on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn agent(config: BridgeConfig) -> anyhow::Result<()> {
    let capture = CaptureConfig::load(config.capture_config_path.as_deref());
    let attacher = CdpAttacher::new(config.cdp_endpoint.clone(), config.page_match.clone());
    let page = ReattachingPage::attach(Box::new(attacher)).await?;

    let session = CaptureSession::new(Arc::new(page), Arc::new(TokioScheduler), capture)?;
    let dispatcher = Dispatcher::new(Arc::new(session), StatusReporter::new());

    info!("Connecting to relay at {}", config.relay_url);
    AgentClient::new(config.relay_url, dispatcher).run().await;
    Ok(())
}
