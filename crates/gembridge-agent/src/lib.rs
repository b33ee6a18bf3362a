//! Capture agent: keeps a socket open to the relay and runs prompts on the page.

pub mod client;
pub mod dispatch;
pub mod status;

pub use client::{AgentClient, Backoff};
pub use dispatch::Dispatcher;
pub use status::{AgentStatus, StatusReporter};
