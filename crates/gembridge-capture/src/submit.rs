//! Submission protocol: type the prompt, click send, verify the page took it.

use gembridge_core::{Error, Result};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::CaptureConfig;
use crate::page::{ChatPage, ElementRef};
use crate::probe::DomProbe;
use crate::scheduler::Scheduler;

/// How the submission was (or was assumed to be) accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SubmissionOutcome {
    /// Input emptied after the first click.
    Confirmed,
    /// Input emptied after the second click.
    ConfirmedAfterRetry,
    /// Clicks did not empty the input (or no control existed); Enter was sent.
    EnterFallback,
    /// Clicks did not empty the input and the Enter fallback is disabled.
    ClickUnverified,
}

pub struct SubmissionProtocol<'a> {
    probe: &'a DomProbe,
    config: &'a CaptureConfig,
    scheduler: &'a dyn Scheduler,
}

impl<'a> SubmissionProtocol<'a> {
    pub fn new(probe: &'a DomProbe, config: &'a CaptureConfig, scheduler: &'a dyn Scheduler) -> Self {
        Self {
            probe,
            config,
            scheduler,
        }
    }

    pub async fn submit(
        &self,
        page: &dyn ChatPage,
        input: &ElementRef,
        text: &str,
    ) -> Result<SubmissionOutcome> {
        page.focus(input).await?;
        page.insert_text(input, text).await?;
        page.dispatch_input_events(input).await?;

        self.scheduler.sleep(self.config.settle_interval()).await;

        // The send control often only renders once the input has text.
        let Some(send) = self.probe.find_send_control(page).await? else {
            if self.config.enter_fallback {
                warn!("Send control not found; falling back to Enter");
                page.press_enter(input).await?;
                return Ok(SubmissionOutcome::EnterFallback);
            }
            return Err(Error::SubmissionFailed("send control not found".into()));
        };

        page.pointer_click(&send).await?;
        info!("Prompt submitted ({} chars)", text.chars().count());

        self.scheduler.sleep(self.config.verify_delay()).await;
        if input_is_empty(page, input).await? {
            return Ok(SubmissionOutcome::Confirmed);
        }

        debug!("Input still populated after click; retrying once");
        let retry = self.probe.find_send_control(page).await?.unwrap_or(send);
        page.pointer_click(&retry).await?;

        self.scheduler.sleep(self.config.verify_delay()).await;
        if input_is_empty(page, input).await? {
            return Ok(SubmissionOutcome::ConfirmedAfterRetry);
        }

        if self.config.enter_fallback {
            warn!("Clicks not acknowledged; sending Enter");
            page.press_enter(input).await?;
            Ok(SubmissionOutcome::EnterFallback)
        } else {
            warn!("Clicks not acknowledged and Enter fallback disabled");
            Ok(SubmissionOutcome::ClickUnverified)
        }
    }
}

async fn input_is_empty(page: &dyn ChatPage, input: &ElementRef) -> Result<bool> {
    Ok(page.element_text(input).await?.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::fixture::{FixtureElement, FixturePage};
    use crate::scheduler::VirtualScheduler;

    fn page_with_input() -> (FixturePage, ElementRef) {
        let page = FixturePage::new();
        let input = page.add(
            &[r#"div[contenteditable="true"]"#],
            FixtureElement::new("div"),
        );
        (page, input)
    }

    fn add_send(page: &FixturePage) -> ElementRef {
        page.add(
            &[r#"button[aria-label*="Send"]"#],
            FixtureElement::new("button").label("Send message"),
        )
    }

    #[tokio::test]
    async fn test_confirmed_on_first_click() {
        let (page, input) = page_with_input();
        let send = add_send(&page);
        let config = CaptureConfig::default();
        let probe = DomProbe::from_config(&config);
        let scheduler = VirtualScheduler::new();

        let outcome = SubmissionProtocol::new(&probe, &config, &scheduler)
            .submit(&page, &input, "What is Rust?")
            .await
            .unwrap();

        assert_eq!(outcome, SubmissionOutcome::Confirmed);
        assert_eq!(page.submitted_prompts(), vec!["What is Rust?"]);
        assert_eq!(
            page.actions(),
            vec![
                format!("focus:{}", input.0),
                format!("insert:{}", input.0),
                format!("input-events:{}", input.0),
                format!("click:{}", send.0),
            ]
        );
        // settle + one verify delay
        assert_eq!(scheduler.elapsed(), Duration::from_millis(3000));
    }

    #[tokio::test]
    async fn test_enter_fallback_after_dead_clicks() {
        let (page, input) = page_with_input();
        add_send(&page);
        page.ignore_clicks(true);
        let config = CaptureConfig::default();
        let probe = DomProbe::from_config(&config);
        let scheduler = VirtualScheduler::new();

        let outcome = SubmissionProtocol::new(&probe, &config, &scheduler)
            .submit(&page, &input, "hello there")
            .await
            .unwrap();

        assert_eq!(outcome, SubmissionOutcome::EnterFallback);
        let clicks = page.actions().iter().filter(|a| a.starts_with("click:")).count();
        assert_eq!(clicks, 2);
        assert_eq!(page.submitted_prompts(), vec!["hello there"]);
    }

    #[tokio::test]
    async fn test_no_control_uses_enter() {
        let (page, input) = page_with_input();
        let config = CaptureConfig::default();
        let probe = DomProbe::from_config(&config);
        let scheduler = VirtualScheduler::new();

        let outcome = SubmissionProtocol::new(&probe, &config, &scheduler)
            .submit(&page, &input, "hello")
            .await
            .unwrap();
        assert_eq!(outcome, SubmissionOutcome::EnterFallback);
    }

    #[tokio::test]
    async fn test_no_control_and_no_fallback_fails() {
        let (page, input) = page_with_input();
        let config = CaptureConfig {
            enter_fallback: false,
            ..Default::default()
        };
        let probe = DomProbe::from_config(&config);
        let scheduler = VirtualScheduler::new();

        let err = SubmissionProtocol::new(&probe, &config, &scheduler)
            .submit(&page, &input, "hello")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SubmissionFailed(_)));
    }

    #[tokio::test]
    async fn test_unverified_without_fallback() {
        let (page, input) = page_with_input();
        add_send(&page);
        page.ignore_clicks(true);
        let config = CaptureConfig {
            enter_fallback: false,
            ..Default::default()
        };
        let probe = DomProbe::from_config(&config);
        let scheduler = VirtualScheduler::new();

        let outcome = SubmissionProtocol::new(&probe, &config, &scheduler)
            .submit(&page, &input, "hello")
            .await
            .unwrap();
        assert_eq!(outcome, SubmissionOutcome::ClickUnverified);
    }
}
