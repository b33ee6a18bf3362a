//! The DOM surface the capture core needs from a chat page.

use async_trait::async_trait;
use gembridge_core::Result;
use serde::{Deserialize, Serialize};

/// Opaque handle to an element living in the page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementRef(pub String);

impl std::fmt::Display for ElementRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Layout/accessibility facts used by the send-control heuristic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementInfo {
    pub tag: String,
    pub visible: bool,
    pub enabled: bool,
    pub client_height: f64,
    /// Contains an `svg` (or icon font) child.
    pub has_vector_icon: bool,
    pub aria_label: Option<String>,
}

/// A live chat page. Every call is one round trip into the page context.
#[async_trait]
pub trait ChatPage: Send + Sync {
    /// Elements matching a CSS selector, in document order.
    async fn query_all(&self, selector: &str) -> Result<Vec<ElementRef>>;

    async fn element_info(&self, el: &ElementRef) -> Result<ElementInfo>;

    /// Rendered text of the element.
    async fn element_text(&self, el: &ElementRef) -> Result<String>;

    /// Texts of the outermost `pre`/`code` descendants of the element.
    async fn code_block_texts(&self, el: &ElementRef) -> Result<Vec<String>>;

    /// Rendered text of the whole document body.
    async fn body_text(&self) -> Result<String>;

    async fn focus(&self, el: &ElementRef) -> Result<()>;

    /// Replace the element's editable content with `text`.
    async fn insert_text(&self, el: &ElementRef, text: &str) -> Result<()>;

    /// Fire `input` and `change` so reactive frameworks notice the edit.
    async fn dispatch_input_events(&self, el: &ElementRef) -> Result<()>;

    /// pointerdown → pointerup → click.
    async fn pointer_click(&self, el: &ElementRef) -> Result<()>;

    /// keydown/keypress/keyup for Enter.
    async fn press_enter(&self, el: &ElementRef) -> Result<()>;

    /// The page went away; every later call would fail.
    fn is_closed(&self) -> bool {
        false
    }
}
