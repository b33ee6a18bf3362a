//! Generation monitor: detects when the answer starts and when it settles.
//!
//! ```text
//! Idle → Submitted → AwaitingStart ──start signal──▶ InProgress ──debounce──▶ Stable
//!                          │                              │
//!                          └──window elapsed──▶ TimedOut ◀┘ (soft)
//! ```

use gembridge_core::Result;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::CaptureConfig;
use crate::page::ChatPage;
use crate::probe::DomProbe;
use crate::scheduler::Scheduler;
use crate::types::{GenerationState, PageSnapshot};

/// Which independent signal first reported that generation started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StartSignal {
    StopControl,
    NewAnswerElement,
    TextGrowth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started { signal: StartSignal, ticks: u32 },
    TimedOut { ticks: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StableOutcome {
    /// `Stable`, or `TimedOut` when the window ran out first.
    pub state: GenerationState,
    pub ticks: u32,
    pub final_len: usize,
}

/// Debounced "text stopped changing" detector.
#[derive(Debug, Clone)]
pub struct StabilityTracker {
    baseline: usize,
    min_growth: usize,
    threshold: u32,
    last_len: Option<usize>,
    stable_ticks: u32,
}

impl StabilityTracker {
    /// `initial_len` is the length seen when generation was detected.
    pub fn new(baseline: usize, min_growth: usize, threshold: u32, initial_len: Option<usize>) -> Self {
        Self {
            baseline,
            min_growth,
            threshold: threshold.max(1),
            last_len: initial_len,
            stable_ticks: 0,
        }
    }

    /// Feed one observation; returns true once the debounce threshold is met.
    pub fn observe(&mut self, len: usize, stop_visible: bool) -> bool {
        let changed = self.last_len != Some(len);
        self.last_len = Some(len);

        if stop_visible || changed {
            self.stable_ticks = 0;
        } else if len >= self.baseline + self.min_growth {
            self.stable_ticks += 1;
        }
        self.stable_ticks >= self.threshold
    }

    pub fn stable_ticks(&self) -> u32 {
        self.stable_ticks
    }

    /// Forget the previous observation (used after a failed page read).
    pub fn reset(&mut self) {
        self.stable_ticks = 0;
    }
}

pub struct GenerationMonitor<'a> {
    probe: &'a DomProbe,
    config: &'a CaptureConfig,
    scheduler: &'a dyn Scheduler,
}

impl<'a> GenerationMonitor<'a> {
    pub fn new(probe: &'a DomProbe, config: &'a CaptureConfig, scheduler: &'a dyn Scheduler) -> Self {
        Self {
            probe,
            config,
            scheduler,
        }
    }

    /// Poll until any start signal fires or the start window elapses.
    pub async fn await_start(
        &self,
        page: &dyn ChatPage,
        snapshot: &PageSnapshot,
        prompt: &str,
    ) -> StartOutcome {
        let max_ticks = self.config.start_max_ticks();
        let growth_target =
            snapshot.text_len() + prompt.chars().count() + self.config.growth_margin_chars;

        for tick in 1..=max_ticks {
            self.scheduler.sleep(self.config.start_poll_interval()).await;

            match self.start_signal(page, snapshot, growth_target).await {
                Ok(Some(signal)) => {
                    info!("Generation started ({:?}) after {} ticks", signal, tick);
                    return StartOutcome::Started { signal, ticks: tick };
                }
                Ok(None) => {}
                Err(e) => warn!("Start probe failed on tick {}: {}", tick, e),
            }
        }

        warn!(
            "No generation start within {}s",
            self.config.start_timeout_secs
        );
        StartOutcome::TimedOut { ticks: max_ticks }
    }

    async fn start_signal(
        &self,
        page: &dyn ChatPage,
        snapshot: &PageSnapshot,
        growth_target: usize,
    ) -> Result<Option<StartSignal>> {
        if self.probe.find_stop_indicator(page).await?.is_some() {
            return Ok(Some(StartSignal::StopControl));
        }

        // A re-rendered slot keeps the count, so fall back to the last element.
        let answers = self.probe.answer_elements(page).await?;
        let candidate = answers
            .get(snapshot.answer_element_count)
            .or_else(|| answers.last());
        if let Some(el) = candidate {
            let text = page.element_text(el).await?;
            let text = text.trim();
            if text.chars().count() > self.config.min_new_element_chars
                && !snapshot.full_text.contains(text)
            {
                return Ok(Some(StartSignal::NewAnswerElement));
            }
        }

        // Must outgrow the echoed prompt, not just include it.
        let len = page.body_text().await?.chars().count();
        if len > growth_target {
            return Ok(Some(StartSignal::TextGrowth));
        }
        Ok(None)
    }

    /// Poll until the text holds still for the debounce threshold.
    ///
    /// Running out of time is soft: the caller extracts whatever is there.
    pub async fn await_stable(
        &self,
        page: &dyn ChatPage,
        snapshot: &PageSnapshot,
    ) -> StableOutcome {
        let max_ticks = self.config.stable_max_ticks();
        let initial_len = page.body_text().await.ok().map(|t| t.chars().count());
        let mut tracker = StabilityTracker::new(
            snapshot.text_len(),
            self.config.min_growth_chars,
            self.config.debounce.ticks(),
            initial_len,
        );
        let mut final_len = initial_len.unwrap_or(0);

        for tick in 1..=max_ticks {
            self.scheduler.sleep(self.config.stable_poll_interval()).await;

            let stop_visible = match self.probe.find_stop_indicator(page).await {
                Ok(stop) => stop.is_some(),
                Err(e) => {
                    warn!("Stop probe failed on tick {}: {}", tick, e);
                    false
                }
            };
            let len = match page.body_text().await {
                Ok(text) => text.chars().count(),
                Err(e) => {
                    warn!("Text read failed on tick {}: {}", tick, e);
                    tracker.reset();
                    continue;
                }
            };
            final_len = len;

            if tracker.observe(len, stop_visible) {
                info!("Response stable after {} ticks ({} chars)", tick, len);
                return StableOutcome {
                    state: GenerationState::Stable,
                    ticks: tick,
                    final_len,
                };
            }
            if tracker.stable_ticks() == 0 {
                debug!("Text changing... ({} chars)", len);
            }
        }

        warn!(
            "Response not stable within {}s; extracting current text",
            self.config.stable_timeout_secs
        );
        StableOutcome {
            state: GenerationState::TimedOut,
            ticks: max_ticks,
            final_len,
        }
    }
}
