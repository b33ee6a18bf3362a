//! Transport events exchanged between the relay server and the capture agent.

use gembridge_core::{Error, Result};
use serde::{Deserialize, Serialize};

pub const EXECUTE_PROMPT: &str = "execute-prompt";
pub const GEMINI_RESPONSE: &str = "gemini-response";

/// One JSON text frame on the relay socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum TransportEvent {
    /// Server → agent.
    #[serde(rename = "execute-prompt")]
    ExecutePrompt(ExecutePrompt),
    /// Agent → server.
    #[serde(rename = "gemini-response")]
    GeminiResponse(GeminiResponse),
}

impl TransportEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ExecutePrompt(_) => EXECUTE_PROMPT,
            Self::GeminiResponse(_) => GEMINI_RESPONSE,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::Protocol(format!("bad frame: {}", e)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutePrompt {
    pub prompt: String,
    /// Correlation id echoed back in the matching response.
    #[serde(rename = "requestId", default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

const ERROR_PREFIX: &str = "Error: ";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeminiResponse {
    pub text: String,
    #[serde(rename = "requestId", default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Error kind when the capture failed; `text` then holds `"Error: ..."`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GeminiResponse {
    pub fn success(text: impl Into<String>, request_id: Option<String>) -> Self {
        Self {
            text: text.into(),
            request_id,
            error: None,
        }
    }

    pub fn failure(err: &Error, request_id: Option<String>) -> Self {
        Self {
            text: format!("{}{}", ERROR_PREFIX, err),
            request_id,
            error: Some(err.kind().to_string()),
        }
    }

    /// Older agents report failures only through the `Error: ` text prefix.
    pub fn is_error(&self) -> bool {
        self.error.is_some() || self.text.starts_with(ERROR_PREFIX)
    }

    /// Convert into the relay-side result of a request.
    pub fn into_result(self) -> Result<String> {
        if !self.is_error() {
            return Ok(self.text);
        }
        let message = self.text.strip_prefix(ERROR_PREFIX).unwrap_or(&self.text);
        Err(Error::CaptureFailed(message.to_string()))
    }
}

/// Connection lifecycle observed on both ends of the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    Connect,
    Disconnect,
    ConnectError(String),
}

impl LifecycleEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::ConnectError(_) => "connect_error",
        }
    }
}
