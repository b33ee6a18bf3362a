//! DOM probe: layered fallback lookups for the input, send/stop controls and answers.
//!
//! Every lookup is an ordered list of strategies; the first one that yields a
//! result wins and results are never merged across strategies.

use gembridge_core::{Error, Result};
use tracing::debug;

use crate::config::CaptureConfig;
use crate::page::{ChatPage, ElementRef};

/// A plain CSS selector tried as one step of a fallback chain.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectorStrategy {
    pub selector: String,
}

impl SelectorStrategy {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
        }
    }

    pub async fn resolve(&self, page: &dyn ChatPage) -> Result<Vec<ElementRef>> {
        page.query_all(&self.selector).await
    }
}

/// One way of finding a clickable control.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlStrategy {
    /// `button[aria-label*="<label>"]`; the first match wins.
    AriaLabel(String),
    /// Visible, enabled button with a vector icon, taller than `min_height` px.
    IconButton { min_height: f64 },
}

impl ControlStrategy {
    pub async fn resolve(&self, page: &dyn ChatPage) -> Result<Option<ElementRef>> {
        match self {
            Self::AriaLabel(label) => {
                let selector = format!(r#"button[aria-label*="{}"]"#, escape_attr(label));
                Ok(page.query_all(&selector).await?.into_iter().next())
            }
            Self::IconButton { min_height } => {
                for button in page.query_all("button").await? {
                    let info = page.element_info(&button).await?;
                    if info.visible
                        && info.enabled
                        && info.has_vector_icon
                        && info.client_height > *min_height
                    {
                        return Ok(Some(button));
                    }
                }
                Ok(None)
            }
        }
    }
}

fn escape_attr(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Stateless lookups over a live page.
#[derive(Debug, Clone)]
pub struct DomProbe {
    input: Vec<SelectorStrategy>,
    send: Vec<ControlStrategy>,
    stop: Vec<ControlStrategy>,
    answers: Vec<SelectorStrategy>,
}

impl DomProbe {
    pub fn from_config(config: &CaptureConfig) -> Self {
        let mut send: Vec<ControlStrategy> = config
            .send_labels
            .iter()
            .map(|l| ControlStrategy::AriaLabel(l.clone()))
            .collect();
        // Label matches always run before the heuristic.
        send.push(ControlStrategy::IconButton {
            min_height: config.min_click_target_px,
        });

        Self {
            input: config
                .input_selectors
                .iter()
                .map(SelectorStrategy::new)
                .collect(),
            send,
            stop: config
                .stop_labels
                .iter()
                .map(|l| ControlStrategy::AriaLabel(l.clone()))
                .collect(),
            answers: config
                .answer_selectors
                .iter()
                .map(SelectorStrategy::new)
                .collect(),
        }
    }

    pub fn send_strategies(&self) -> &[ControlStrategy] {
        &self.send
    }

    /// First editable text element. Missing input is fatal for the request.
    pub async fn find_input(&self, page: &dyn ChatPage) -> Result<ElementRef> {
        for strategy in &self.input {
            if let Some(el) = strategy.resolve(page).await?.into_iter().next() {
                debug!("Input found via {}", strategy.selector);
                return Ok(el);
            }
        }
        Err(Error::InputNotFound)
    }

    pub async fn find_send_control(&self, page: &dyn ChatPage) -> Result<Option<ElementRef>> {
        for strategy in &self.send {
            if let Some(el) = strategy.resolve(page).await? {
                debug!("Send control found via {:?}", strategy);
                return Ok(Some(el));
            }
        }
        Ok(None)
    }

    /// Visible stop/interrupt control, if the page is currently generating.
    pub async fn find_stop_indicator(&self, page: &dyn ChatPage) -> Result<Option<ElementRef>> {
        for strategy in &self.stop {
            if let ControlStrategy::AriaLabel(label) = strategy {
                let selector = format!(r#"button[aria-label*="{}"]"#, escape_attr(label));
                for el in page.query_all(&selector).await? {
                    if page.element_info(&el).await?.visible {
                        return Ok(Some(el));
                    }
                }
            } else if let Some(el) = strategy.resolve(page).await? {
                return Ok(Some(el));
            }
        }
        Ok(None)
    }

    /// Answer elements from the first selector strategy with any match.
    pub async fn answer_elements(&self, page: &dyn ChatPage) -> Result<Vec<ElementRef>> {
        for strategy in &self.answers {
            let found = strategy.resolve(page).await?;
            if !found.is_empty() {
                return Ok(found);
            }
        }
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{FixtureElement, FixturePage};

    fn probe() -> DomProbe {
        DomProbe::from_config(&CaptureConfig::default())
    }

    #[tokio::test]
    async fn test_input_fallback_order() {
        let page = FixturePage::new();
        let textbox = page.add(&[r#"div[role="textbox"]"#], FixtureElement::new("div"));
        assert_eq!(probe().find_input(&page).await.unwrap(), textbox);

        let editable = page.add(
            &[r#"div[contenteditable="true"]"#],
            FixtureElement::new("div"),
        );
        assert_eq!(probe().find_input(&page).await.unwrap(), editable);
    }

    #[tokio::test]
    async fn test_missing_input() {
        let page = FixturePage::new();
        let err = probe().find_input(&page).await.unwrap_err();
        assert!(matches!(err, Error::InputNotFound));
    }

    #[tokio::test]
    async fn test_label_beats_heuristic() {
        let page = FixturePage::new();
        let icon = page.add(
            &["button"],
            FixtureElement::new("button").with_icon().height(40.0),
        );
        assert_eq!(probe().find_send_control(&page).await.unwrap(), Some(icon));

        let labelled = page.add(
            &["button", r#"button[aria-label*="Invia"]"#],
            FixtureElement::new("button").label("Invia messaggio"),
        );
        assert_eq!(
            probe().find_send_control(&page).await.unwrap(),
            Some(labelled)
        );
    }

    #[tokio::test]
    async fn test_heuristic_rejects_small_disabled_hidden() {
        let page = FixturePage::new();
        page.add(&["button"], FixtureElement::new("button").with_icon().height(16.0));
        page.add(
            &["button"],
            FixtureElement::new("button").with_icon().height(40.0).disabled(),
        );
        page.add(
            &["button"],
            FixtureElement::new("button").with_icon().height(40.0).hidden(),
        );
        page.add(&["button"], FixtureElement::new("button").height(40.0));
        assert_eq!(probe().find_send_control(&page).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_answer_strategies_not_merged() {
        let page = FixturePage::new();
        let first = page.add(&[".markdown", ".message-content"], FixtureElement::new("div"));
        page.add(&[".message-content"], FixtureElement::new("div"));

        let found = probe().answer_elements(&page).await.unwrap();
        assert_eq!(found, vec![first]);
    }

    #[tokio::test]
    async fn test_answer_strategy_fallback() {
        let page = FixturePage::new();
        let a = page.add(&[".message-content"], FixtureElement::new("div"));
        let b = page.add(&[".message-content"], FixtureElement::new("div"));
        assert_eq!(probe().answer_elements(&page).await.unwrap(), vec![a, b]);
    }

    #[tokio::test]
    async fn test_stop_indicator_requires_visible() {
        let page = FixturePage::new();
        let stop = page.add(
            &[r#"button[aria-label*="Stop"]"#],
            FixtureElement::new("button").label("Stop response").hidden(),
        );
        assert_eq!(probe().find_stop_indicator(&page).await.unwrap(), None);

        page.set_visible(&stop, true);
        assert_eq!(
            probe().find_stop_indicator(&page).await.unwrap(),
            Some(stop)
        );
    }

    #[test]
    fn test_attr_escaping() {
        assert_eq!(escape_attr(r#"Say "hi""#), r#"Say \"hi\""#);
    }
}
