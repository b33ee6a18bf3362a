//! Error types for GemBridge.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Input box not found")]
    InputNotFound,

    #[error("Submission failed: {0}")]
    SubmissionFailed(String),

    #[error("Generation never started within {0}s")]
    GenerationNeverStarted(u64),

    #[error("Captured text empty or too short ({0} chars)")]
    EmptyOrTooShortCapture(usize),

    #[error("No active capture agent connection")]
    NoActiveAgent,

    #[error("Timeout waiting for capture response after {0}s")]
    RequestTimeout(u64),

    #[error("A prompt is already in flight on this page")]
    RequestAlreadyInFlight,

    /// Failure reported by the agent over the transport.
    #[error("Capture failed: {0}")]
    CaptureFailed(String),

    #[error("Page error: {0}")]
    Page(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Stable identifier sent on the wire next to the human-readable message.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InputNotFound => "InputNotFound",
            Self::SubmissionFailed(_) => "SubmissionFailed",
            Self::GenerationNeverStarted(_) => "GenerationNeverStarted",
            Self::EmptyOrTooShortCapture(_) => "EmptyOrTooShortCapture",
            Self::NoActiveAgent => "NoActiveAgent",
            Self::RequestTimeout(_) => "RequestTimeout",
            Self::RequestAlreadyInFlight => "RequestAlreadyInFlight",
            Self::CaptureFailed(_) => "CaptureFailed",
            Self::Page(_) => "Page",
            Self::Transport(_) => "Transport",
            Self::Protocol(_) => "Protocol",
            Self::Io(_) => "Io",
            Self::Json(_) => "Json",
            Self::Config(_) => "Config",
        }
    }

    /// HTTP status the relay answers with when this error ends a request.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NoActiveAgent => 503,
            Self::Protocol(_) | Self::Json(_) => 400,
            Self::Config(_) | Self::Io(_) => 500,
            // Everything the agent propagates and every relay timeout.
            _ => 504,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
