//! Capture tuning: timings, thresholds, selector chains and the noise table.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::noise::{default_noise_rules, NoiseRule};

/// How many consecutive unchanged ticks count as "generation finished".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DebounceProfile {
    /// 4 ticks.
    Simple,
    /// 10 ticks; survives longer streaming micro-pauses.
    Hardened,
    Custom(u32),
}

impl DebounceProfile {
    pub fn ticks(&self) -> u32 {
        match self {
            Self::Simple => 4,
            Self::Hardened => 10,
            Self::Custom(n) => (*n).max(1),
        }
    }
}

/// What the post-processor accepts as a structured payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BracketMode {
    /// Largest greedy `{...}` / `[...]` match, taken as-is.
    Greedy,
    /// Same candidate, but only kept when it parses as JSON.
    Json,
    Off,
}

/// Persisted capture configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    #[serde(default = "default_verify_delay_ms")]
    pub verify_delay_ms: u64,
    #[serde(default = "default_true")]
    pub enter_fallback: bool,

    #[serde(default = "default_start_timeout_secs")]
    pub start_timeout_secs: u64,
    #[serde(default = "default_start_poll_ms")]
    pub start_poll_ms: u64,
    #[serde(default = "default_stable_timeout_secs")]
    pub stable_timeout_secs: u64,
    #[serde(default = "default_stable_poll_ms")]
    pub stable_poll_ms: u64,
    #[serde(default = "default_debounce")]
    pub debounce: DebounceProfile,

    /// A new answer element only counts once its text is longer than this.
    #[serde(default = "default_min_new_element_chars")]
    pub min_new_element_chars: usize,
    /// Slack on top of snapshot + prompt length before growth counts as output.
    #[serde(default = "default_growth_margin_chars")]
    pub growth_margin_chars: usize,
    /// Growth over the snapshot required before stability ticks accumulate.
    #[serde(default = "default_min_growth_chars")]
    pub min_growth_chars: usize,
    #[serde(default = "default_min_capture_chars")]
    pub min_capture_chars: usize,
    #[serde(default = "default_tail_fallback_chars")]
    pub tail_fallback_chars: usize,
    #[serde(default = "default_prompt_prefix_chars")]
    pub prompt_prefix_chars: usize,
    #[serde(default = "default_min_click_target_px")]
    pub min_click_target_px: f64,

    #[serde(default = "default_input_selectors")]
    pub input_selectors: Vec<String>,
    #[serde(default = "default_send_labels")]
    pub send_labels: Vec<String>,
    #[serde(default = "default_stop_labels")]
    pub stop_labels: Vec<String>,
    #[serde(default = "default_answer_selectors")]
    pub answer_selectors: Vec<String>,

    #[serde(default = "default_bracket_mode")]
    pub bracket_mode: BracketMode,
    #[serde(default = "default_noise_rules")]
    pub noise_rules: Vec<NoiseRule>,
}

fn default_true() -> bool {
    true
}
fn default_settle_ms() -> u64 {
    2000
}
fn default_verify_delay_ms() -> u64 {
    1000
}
fn default_start_timeout_secs() -> u64 {
    120
}
fn default_start_poll_ms() -> u64 {
    500
}
fn default_stable_timeout_secs() -> u64 {
    600
}
fn default_stable_poll_ms() -> u64 {
    1000
}
fn default_debounce() -> DebounceProfile {
    DebounceProfile::Hardened
}
fn default_min_new_element_chars() -> usize {
    20
}
fn default_growth_margin_chars() -> usize {
    50
}
fn default_min_growth_chars() -> usize {
    10
}
fn default_min_capture_chars() -> usize {
    10
}
fn default_tail_fallback_chars() -> usize {
    2000
}
fn default_prompt_prefix_chars() -> usize {
    30
}
fn default_min_click_target_px() -> f64 {
    20.0
}
fn default_bracket_mode() -> BracketMode {
    BracketMode::Greedy
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_input_selectors() -> Vec<String> {
    strings(&[
        r#"div[contenteditable="true"]"#,
        r#"div[role="textbox"]"#,
        "textarea",
    ])
}
fn default_send_labels() -> Vec<String> {
    strings(&["Send", "Invia", "Senden", "Envoyer", "Enviar"])
}
fn default_stop_labels() -> Vec<String> {
    strings(&["Stop", "Interrompi", "Stopp", "Arrêter", "Detener"])
}
fn default_answer_selectors() -> Vec<String> {
    strings(&[".markdown", ".model-response-text", ".message-content"])
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            settle_ms: default_settle_ms(),
            verify_delay_ms: default_verify_delay_ms(),
            enter_fallback: true,
            start_timeout_secs: default_start_timeout_secs(),
            start_poll_ms: default_start_poll_ms(),
            stable_timeout_secs: default_stable_timeout_secs(),
            stable_poll_ms: default_stable_poll_ms(),
            debounce: default_debounce(),
            min_new_element_chars: default_min_new_element_chars(),
            growth_margin_chars: default_growth_margin_chars(),
            min_growth_chars: default_min_growth_chars(),
            min_capture_chars: default_min_capture_chars(),
            tail_fallback_chars: default_tail_fallback_chars(),
            prompt_prefix_chars: default_prompt_prefix_chars(),
            min_click_target_px: default_min_click_target_px(),
            input_selectors: default_input_selectors(),
            send_labels: default_send_labels(),
            stop_labels: default_stop_labels(),
            answer_selectors: default_answer_selectors(),
            bracket_mode: default_bracket_mode(),
            noise_rules: default_noise_rules(),
        }
    }
}

impl CaptureConfig {
    /// Load config from a JSON file, or return defaults.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };
        match std::fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str::<CaptureConfig>(&raw) {
                Ok(config) => {
                    info!("Loaded capture config from {}", path.display());
                    config
                }
                Err(e) => {
                    warn!("Invalid capture config {}: {}; using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Cannot read capture config {}: {}; using defaults", path.display(), e);
                Self::default()
            }
        }
    }

    /// Settle delay before clicking send; never zero.
    pub fn settle_interval(&self) -> Duration {
        Duration::from_millis(self.settle_ms.max(1))
    }

    pub fn verify_delay(&self) -> Duration {
        Duration::from_millis(self.verify_delay_ms)
    }

    pub fn start_poll_interval(&self) -> Duration {
        Duration::from_millis(self.start_poll_ms.max(1))
    }

    pub fn stable_poll_interval(&self) -> Duration {
        Duration::from_millis(self.stable_poll_ms.max(1))
    }

    /// Number of polls in the start-detection window.
    pub fn start_max_ticks(&self) -> u32 {
        ticks_in(self.start_timeout_secs, self.start_poll_ms)
    }

    /// Number of polls in the stability window.
    pub fn stable_max_ticks(&self) -> u32 {
        ticks_in(self.stable_timeout_secs, self.stable_poll_ms)
    }
}

fn ticks_in(window_secs: u64, poll_ms: u64) -> u32 {
    let ticks = (window_secs * 1000) / poll_ms.max(1);
    ticks.clamp(1, u32::MAX as u64) as u32
}
