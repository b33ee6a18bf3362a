//! Capture data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::monitor::StartSignal;
use crate::submit::SubmissionOutcome;

/// One prompt to run against the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptRequest {
    pub text: String,
    /// Correlation id from the transport, echoed in the response.
    #[serde(rename = "requestId", skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl PromptRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            request_id: None,
        }
    }
}

/// Page state captured right before submission.
#[derive(Debug, Clone, Serialize)]
pub struct PageSnapshot {
    #[serde(rename = "fullText")]
    pub full_text: String,
    #[serde(rename = "answerElementCount")]
    pub answer_element_count: usize,
    #[serde(rename = "capturedAt")]
    pub captured_at: DateTime<Utc>,
}

impl PageSnapshot {
    pub fn new(full_text: String, answer_element_count: usize) -> Self {
        Self {
            full_text,
            answer_element_count,
            captured_at: Utc::now(),
        }
    }

    /// Length of the baseline text in chars.
    pub fn text_len(&self) -> usize {
        self.full_text.chars().count()
    }

    /// Whether `text` was already on the page before submission.
    pub fn contains(&self, text: &str) -> bool {
        let needle = text.trim();
        !needle.is_empty() && self.full_text.contains(needle)
    }
}

/// Lifecycle of one request through the capture state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GenerationState {
    Idle,
    Submitted,
    AwaitingStart,
    InProgress,
    Stable,
    TimedOut,
    Failed,
}

impl std::fmt::Display for GenerationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Submitted => "submitted",
            Self::AwaitingStart => "awaitingStart",
            Self::InProgress => "inProgress",
            Self::Stable => "stable",
            Self::TimedOut => "timedOut",
            Self::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Which extraction strategy produced the answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtractionMethod {
    CodeBlock,
    ElementText,
    TextDiff,
}

/// Final answer handed to the transport.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapturedAnswer {
    #[serde(rename = "rawText")]
    pub raw_text: String,
    #[serde(rename = "extractionMethod")]
    pub extraction_method: ExtractionMethod,
    #[serde(rename = "charCount")]
    pub char_count: usize,
}

impl CapturedAnswer {
    pub fn new(raw_text: String, extraction_method: ExtractionMethod) -> Self {
        let char_count = raw_text.chars().count();
        Self {
            raw_text,
            extraction_method,
            char_count,
        }
    }
}

/// Everything one capture run observed, for logging and tests.
#[derive(Debug, Clone, Serialize)]
pub struct CaptureReport {
    pub answer: CapturedAnswer,
    pub submission: SubmissionOutcome,
    #[serde(rename = "startSignal")]
    pub start_signal: Option<StartSignal>,
    /// Every state the run passed through, in order.
    pub states: Vec<GenerationState>,
}

impl CaptureReport {
    pub fn final_state(&self) -> GenerationState {
        self.states.last().copied().unwrap_or(GenerationState::Idle)
    }
}
