//! In-memory chat page for tests and dry runs.
//!
//! Elements are registered under the exact selector strings they should
//! answer to, so a fixture reads like a snapshot of which selectors matched
//! on the real page. Submitting (clicking a control or pressing Enter on the
//! input) clears the input and runs the `on_submit` hook, which is where a
//! test appends the generated answer.

use std::sync::Arc;

use async_trait::async_trait;
use gembridge_core::{Error, Result};
use parking_lot::Mutex;

use crate::page::{ChatPage, ElementInfo, ElementRef};

type SubmitHook = Arc<dyn Fn(&FixturePage, &str) + Send + Sync>;

/// Builder for one fixture element.
#[derive(Debug, Clone)]
pub struct FixtureElement {
    selectors: Vec<String>,
    info: ElementInfo,
    text: String,
    code_blocks: Vec<String>,
}

impl FixtureElement {
    /// A visible, enabled element with a 32px client height.
    pub fn new(tag: &str) -> Self {
        Self {
            selectors: Vec::new(),
            info: ElementInfo {
                tag: tag.to_string(),
                visible: true,
                enabled: true,
                client_height: 32.0,
                has_vector_icon: false,
                aria_label: None,
            },
            text: String::new(),
            code_blocks: Vec::new(),
        }
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn code_blocks(mut self, blocks: &[&str]) -> Self {
        self.code_blocks = blocks.iter().map(|b| b.to_string()).collect();
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.info.aria_label = Some(label.into());
        self
    }

    pub fn with_icon(mut self) -> Self {
        self.info.has_vector_icon = true;
        self
    }

    pub fn height(mut self, px: f64) -> Self {
        self.info.client_height = px;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.info.visible = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.info.enabled = false;
        self
    }
}

#[derive(Default)]
struct FixtureState {
    elements: Vec<FixtureElement>,
    body_text: String,
    focused: Option<usize>,
    actions: Vec<String>,
    submitted: Vec<String>,
    ignore_clicks: bool,
    ignore_enter: bool,
    closed: bool,
    on_submit: Option<SubmitHook>,
}

/// Shared-handle fixture page; clones observe the same state.
#[derive(Clone, Default)]
pub struct FixturePage {
    state: Arc<Mutex<FixtureState>>,
}

impl FixturePage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an element answering to each of `selectors`.
    pub fn add(&self, selectors: &[&str], mut element: FixtureElement) -> ElementRef {
        element.selectors = selectors.iter().map(|s| s.to_string()).collect();
        let mut state = self.state.lock();
        state.elements.push(element);
        ElementRef((state.elements.len() - 1).to_string())
    }

    pub fn set_text(&self, el: &ElementRef, text: impl Into<String>) {
        if let Some(idx) = index(el) {
            if let Some(element) = self.state.lock().elements.get_mut(idx) {
                element.text = text.into();
            }
        }
    }

    pub fn text_of(&self, el: &ElementRef) -> String {
        index(el)
            .and_then(|idx| self.state.lock().elements.get(idx).map(|e| e.text.clone()))
            .unwrap_or_default()
    }

    pub fn set_visible(&self, el: &ElementRef, visible: bool) {
        if let Some(idx) = index(el) {
            if let Some(element) = self.state.lock().elements.get_mut(idx) {
                element.info.visible = visible;
            }
        }
    }

    pub fn set_body_text(&self, text: impl Into<String>) {
        self.state.lock().body_text = text.into();
    }

    pub fn append_body_text(&self, text: &str) {
        self.state.lock().body_text.push_str(text);
    }

    /// Clicks on controls no longer submit (a dead send button).
    pub fn ignore_clicks(&self, ignore: bool) {
        self.state.lock().ignore_clicks = ignore;
    }

    pub fn ignore_enter(&self, ignore: bool) {
        self.state.lock().ignore_enter = ignore;
    }

    /// Hook run with the submitted prompt after every accepted submission.
    pub fn on_submit(&self, hook: impl Fn(&FixturePage, &str) + Send + Sync + 'static) {
        self.state.lock().on_submit = Some(Arc::new(hook));
    }

    /// Log of page-mutating calls, e.g. `"click:3"`.
    pub fn actions(&self) -> Vec<String> {
        self.state.lock().actions.clone()
    }

    pub fn submitted_prompts(&self) -> Vec<String> {
        self.state.lock().submitted.clone()
    }

    /// Simulate the tab going away: later calls fail with a transport error.
    pub fn close(&self) {
        self.state.lock().closed = true;
    }

    fn alive(&self) -> Result<()> {
        if self.state.lock().closed {
            return Err(Error::Transport("page closed".into()));
        }
        Ok(())
    }

    fn element(&self, el: &ElementRef) -> Result<FixtureElement> {
        self.alive()?;
        index(el)
            .and_then(|idx| self.state.lock().elements.get(idx).cloned())
            .ok_or_else(|| Error::Page(format!("element {} detached", el)))
    }

    fn record(&self, action: String) {
        self.state.lock().actions.push(action);
    }

    /// Submit whatever the focused input holds.
    fn submit_focused(&self) {
        let (prompt, hook) = {
            let mut state = self.state.lock();
            let Some(idx) = state.focused else {
                return;
            };
            let prompt = std::mem::take(&mut state.elements[idx].text);
            if prompt.is_empty() {
                return;
            }
            state.submitted.push(prompt.clone());
            (prompt, state.on_submit.clone())
        };
        if let Some(hook) = hook {
            hook(self, &prompt);
        }
    }
}

fn index(el: &ElementRef) -> Option<usize> {
    el.0.parse().ok()
}

#[async_trait]
impl ChatPage for FixturePage {
    async fn query_all(&self, selector: &str) -> Result<Vec<ElementRef>> {
        self.alive()?;
        let state = self.state.lock();
        Ok(state
            .elements
            .iter()
            .enumerate()
            .filter(|(_, e)| e.selectors.iter().any(|s| s == selector))
            .map(|(i, _)| ElementRef(i.to_string()))
            .collect())
    }

    async fn element_info(&self, el: &ElementRef) -> Result<ElementInfo> {
        Ok(self.element(el)?.info)
    }

    async fn element_text(&self, el: &ElementRef) -> Result<String> {
        Ok(self.element(el)?.text)
    }

    async fn code_block_texts(&self, el: &ElementRef) -> Result<Vec<String>> {
        Ok(self.element(el)?.code_blocks)
    }

    async fn body_text(&self) -> Result<String> {
        self.alive()?;
        Ok(self.state.lock().body_text.clone())
    }

    async fn focus(&self, el: &ElementRef) -> Result<()> {
        self.element(el)?;
        self.state.lock().focused = index(el);
        self.record(format!("focus:{}", el.0));
        Ok(())
    }

    async fn insert_text(&self, el: &ElementRef, text: &str) -> Result<()> {
        self.element(el)?;
        self.set_text(el, text);
        self.record(format!("insert:{}", el.0));
        Ok(())
    }

    async fn dispatch_input_events(&self, el: &ElementRef) -> Result<()> {
        self.element(el)?;
        self.record(format!("input-events:{}", el.0));
        Ok(())
    }

    async fn pointer_click(&self, el: &ElementRef) -> Result<()> {
        self.element(el)?;
        self.record(format!("click:{}", el.0));
        if !self.state.lock().ignore_clicks {
            self.submit_focused();
        }
        Ok(())
    }

    async fn press_enter(&self, el: &ElementRef) -> Result<()> {
        self.element(el)?;
        self.record(format!("enter:{}", el.0));
        if !self.state.lock().ignore_enter {
            self.state.lock().focused = index(el);
            self.submit_focused();
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_click_submits_focused_input() {
        let page = FixturePage::new();
        let input = page.add(&["textarea"], FixtureElement::new("textarea"));
        let send = page.add(&["button"], FixtureElement::new("button"));
        page.on_submit(|p, prompt| p.append_body_text(&format!("echo {}", prompt)));

        page.focus(&input).await.unwrap();
        page.insert_text(&input, "hello").await.unwrap();
        page.pointer_click(&send).await.unwrap();

        assert_eq!(page.text_of(&input), "");
        assert_eq!(page.submitted_prompts(), vec!["hello"]);
        assert_eq!(page.body_text().await.unwrap(), "echo hello");
    }

    #[tokio::test]
    async fn test_ignored_clicks_keep_text() {
        let page = FixturePage::new();
        let input = page.add(&["textarea"], FixtureElement::new("textarea"));
        let send = page.add(&["button"], FixtureElement::new("button"));
        page.ignore_clicks(true);

        page.focus(&input).await.unwrap();
        page.insert_text(&input, "hello").await.unwrap();
        page.pointer_click(&send).await.unwrap();
        assert_eq!(page.text_of(&input), "hello");
        assert!(page.submitted_prompts().is_empty());
    }

    #[tokio::test]
    async fn test_detached_element() {
        let page = FixturePage::new();
        let err = page.element_text(&ElementRef("9".into())).await.unwrap_err();
        assert!(matches!(err, Error::Page(_)));
    }
}
