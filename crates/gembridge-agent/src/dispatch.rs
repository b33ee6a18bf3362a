//! Turns one `execute-prompt` into exactly one `gemini-response`.

use std::sync::Arc;

use gembridge_capture::{CaptureSession, PromptRequest};
use gembridge_protocol::{ExecutePrompt, GeminiResponse};
use tracing::{info, warn};

use crate::status::{AgentStatus, StatusReporter};

#[derive(Clone)]
pub struct Dispatcher {
    session: Arc<CaptureSession>,
    status: StatusReporter,
}

impl Dispatcher {
    pub fn new(session: Arc<CaptureSession>, status: StatusReporter) -> Self {
        Self { session, status }
    }

    pub fn status(&self) -> &StatusReporter {
        &self.status
    }

    /// Run the prompt. Failures come back as error payloads, never as `Err`.
    pub async fn handle(&self, request: ExecutePrompt) -> GeminiResponse {
        let id = request.request_id.clone();

        // Reject before touching status so a busy page keeps showing Working.
        let guard = match self.session.try_begin() {
            Ok(guard) => guard,
            Err(e) => {
                warn!("Rejecting prompt {:?}: {}", id, e);
                return GeminiResponse::failure(&e, id);
            }
        };

        info!(
            "Executing prompt {:?} ({} chars)",
            id,
            request.prompt.chars().count()
        );
        self.status.set(AgentStatus::Working);
        let prompt = PromptRequest {
            text: request.prompt,
            request_id: id.clone(),
        };
        let result = self.session.run_claimed(guard, &prompt).await;
        self.status.finish_work();

        match result {
            Ok(report) => {
                info!(
                    "Prompt {:?} answered ({} chars, {})",
                    id,
                    report.answer.char_count,
                    report.final_state()
                );
                GeminiResponse::success(report.answer.raw_text, id)
            }
            Err(e) => GeminiResponse::failure(&e, id),
        }
    }
}

#[cfg(test)]
mod tests {
    use gembridge_capture::{CaptureConfig, FixtureElement, FixturePage, VirtualScheduler};

    use super::*;

    fn chat_page() -> FixturePage {
        let page = FixturePage::new();
        page.add(
            &[r#"div[contenteditable="true"]"#],
            FixtureElement::new("div"),
        );
        page.add(
            &[r#"button[aria-label*="Send"]"#],
            FixtureElement::new("button").label("Send message"),
        );
        page.on_submit(|p, prompt| {
            let answer = format!("You asked about {} and here is the answer.", prompt);
            p.append_body_text(&answer);
            p.add(&[".markdown"], FixtureElement::new("div").text(answer));
        });
        page
    }

    fn dispatcher(page: &FixturePage) -> Dispatcher {
        let session = CaptureSession::new(
            Arc::new(page.clone()),
            Arc::new(VirtualScheduler::new()),
            CaptureConfig::default(),
        )
        .unwrap();
        Dispatcher::new(Arc::new(session), StatusReporter::new())
    }

    fn prompt(text: &str, id: &str) -> ExecutePrompt {
        ExecutePrompt {
            prompt: text.into(),
            request_id: Some(id.into()),
        }
    }

    #[tokio::test]
    async fn test_success_echoes_request_id() {
        let page = chat_page();
        let dispatcher = dispatcher(&page);
        dispatcher.status().set(AgentStatus::Connected);

        let resp = dispatcher.handle(prompt("tides", "r1")).await;
        assert!(!resp.is_error());
        assert_eq!(resp.request_id.as_deref(), Some("r1"));
        assert_eq!(resp.text, "You asked about tides and here is the answer.");
        assert_eq!(dispatcher.status().current(), AgentStatus::Connected);
    }

    #[tokio::test]
    async fn test_failure_becomes_payload() {
        let page = FixturePage::new();
        let dispatcher = dispatcher(&page);

        let resp = dispatcher.handle(prompt("hello", "r2")).await;
        assert_eq!(resp.error.as_deref(), Some("InputNotFound"));
        assert!(resp.text.starts_with("Error: "));
        assert_eq!(resp.request_id.as_deref(), Some("r2"));
    }

    #[tokio::test]
    async fn test_second_prompt_rejected_first_unaffected() {
        let page = chat_page();
        let dispatcher = dispatcher(&page);

        let first = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move { dispatcher.handle(prompt("first", "a")).await })
        };
        tokio::task::yield_now().await;

        let second = dispatcher.handle(prompt("second", "b")).await;
        assert_eq!(second.error.as_deref(), Some("RequestAlreadyInFlight"));
        assert_eq!(second.request_id.as_deref(), Some("b"));
        assert_eq!(dispatcher.status().current(), AgentStatus::Working);

        let first = first.await.unwrap();
        assert!(!first.is_error());
        assert_eq!(first.request_id.as_deref(), Some("a"));
        assert_eq!(page.submitted_prompts(), vec!["first"]);
    }
}
