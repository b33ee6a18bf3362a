//! Response capture: drives a third-party chat page and scrapes the answer.
//!
//! The page is reached through the [`ChatPage`] trait: [`CdpPage`] talks to a
//! live Chromium tab over the DevTools protocol, [`FixturePage`] is an
//! in-memory stand-in for tests. On top of it sit the DOM probe, the
//! submission protocol, the generation monitor and the extraction pipeline,
//! tied together by [`CaptureSession`].

pub mod attach;
pub mod cdp;
pub mod config;
pub mod extract;
pub mod fixture;
pub mod monitor;
pub mod noise;
pub mod page;
pub mod probe;
pub mod scheduler;
pub mod session;
pub mod submit;
pub mod types;

pub use attach::{CdpAttacher, PageAttacher, ReattachingPage};
pub use cdp::CdpPage;
pub use config::{BracketMode, CaptureConfig, DebounceProfile};
pub use extract::ExtractionPipeline;
pub use fixture::{FixtureElement, FixturePage};
pub use monitor::{GenerationMonitor, StabilityTracker, StableOutcome, StartOutcome, StartSignal};
pub use noise::{NoiseRule, NoiseTable};
pub use page::{ChatPage, ElementInfo, ElementRef};
pub use probe::{ControlStrategy, DomProbe, SelectorStrategy};
pub use scheduler::{Scheduler, TokioScheduler, VirtualScheduler};
pub use session::{CaptureSession, InFlightGuard};
pub use submit::{SubmissionOutcome, SubmissionProtocol};
pub use types::*;
