//! Chrome DevTools Protocol backend for [`ChatPage`](crate::page::ChatPage).
//!
//! Start the browser with remote debugging and open the chat in a tab:
//!
//! ```bash
//! chrome --remote-debugging-port=9222 https://gemini.google.com/app
//! ```
//!
//! [`CdpPage::discover`] picks that tab from `/json/list` and every page
//! operation becomes one `Runtime.evaluate` round trip.

mod client;
mod page;
mod protocol;
mod scripts;

pub use client::CdpConnection;
pub use page::CdpPage;
pub use protocol::{CdpRequest, CdpResponse, PageInfo};
