//! Wire protocols: the relay/agent event envelope and native-messaging frames.
//!
//! The relay and the in-page agent exchange JSON text frames shaped as
//! `{"event": ..., "data": ...}`. The browser-side launcher speaks Chrome's
//! native messaging format: a 4-byte little-endian length followed by JSON.

pub mod events;
pub mod native;

pub use events::{ExecutePrompt, GeminiResponse, LifecycleEvent, TransportEvent};
pub use native::{HostReply, HostRequest, MAX_FRAME_LEN};
