//! GemBridge relay: HTTP front door for a browser-resident chat agent.
//!
//! `POST /api/ask` forwards a prompt over the `/socket` WebSocket to the one
//! connected capture agent and waits for its `gemini-response`.

pub mod native_host;
pub mod registry;
pub mod relay;
pub mod routes;
pub mod state;

pub use registry::{AgentHandle, AgentRegistry};
pub use relay::Relay;
pub use routes::build_router;
pub use state::AppState;
