//! Keeps a capture session pointed at a live tab across reloads and restarts.

use std::sync::Arc;

use async_trait::async_trait;
use gembridge_core::Result;
use parking_lot::RwLock;
use tracing::{info, warn};

use crate::cdp::CdpPage;
use crate::page::{ChatPage, ElementInfo, ElementRef};

/// Finds the chat tab and attaches to it.
#[async_trait]
pub trait PageAttacher: Send + Sync {
    async fn attach(&self) -> Result<Arc<dyn ChatPage>>;
}

/// Attaches over CDP to the first tab matching `page_match`.
pub struct CdpAttacher {
    endpoint: String,
    page_match: String,
}

impl CdpAttacher {
    pub fn new(endpoint: impl Into<String>, page_match: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            page_match: page_match.into(),
        }
    }
}

#[async_trait]
impl PageAttacher for CdpAttacher {
    async fn attach(&self) -> Result<Arc<dyn ChatPage>> {
        let page = CdpPage::discover(&self.endpoint, &self.page_match).await?;
        info!("Driving {}", page.url());
        Ok(Arc::new(page))
    }
}

/// A [`ChatPage`] that re-attaches once the current page reports closed.
///
/// A tab lost mid-capture fails that capture; the next call finds the tab again.
pub struct ReattachingPage {
    attacher: Box<dyn PageAttacher>,
    current: RwLock<Arc<dyn ChatPage>>,
}

impl ReattachingPage {
    /// Attach once up front so a missing tab is reported at startup.
    pub async fn attach(attacher: Box<dyn PageAttacher>) -> Result<Self> {
        let page = attacher.attach().await?;
        Ok(Self {
            attacher,
            current: RwLock::new(page),
        })
    }

    async fn live(&self) -> Result<Arc<dyn ChatPage>> {
        let page = self.current.read().clone();
        if !page.is_closed() {
            return Ok(page);
        }

        warn!("Chat page closed; re-attaching");
        let fresh = self.attacher.attach().await?;
        *self.current.write() = fresh.clone();
        Ok(fresh)
    }
}

#[async_trait]
impl ChatPage for ReattachingPage {
    async fn query_all(&self, selector: &str) -> Result<Vec<ElementRef>> {
        self.live().await?.query_all(selector).await
    }

    async fn element_info(&self, el: &ElementRef) -> Result<ElementInfo> {
        self.live().await?.element_info(el).await
    }

    async fn element_text(&self, el: &ElementRef) -> Result<String> {
        self.live().await?.element_text(el).await
    }

    async fn code_block_texts(&self, el: &ElementRef) -> Result<Vec<String>> {
        self.live().await?.code_block_texts(el).await
    }

    async fn body_text(&self) -> Result<String> {
        self.live().await?.body_text().await
    }

    async fn focus(&self, el: &ElementRef) -> Result<()> {
        self.live().await?.focus(el).await
    }

    async fn insert_text(&self, el: &ElementRef, text: &str) -> Result<()> {
        self.live().await?.insert_text(el, text).await
    }

    async fn dispatch_input_events(&self, el: &ElementRef) -> Result<()> {
        self.live().await?.dispatch_input_events(el).await
    }

    async fn pointer_click(&self, el: &ElementRef) -> Result<()> {
        self.live().await?.pointer_click(el).await
    }

    async fn press_enter(&self, el: &ElementRef) -> Result<()> {
        self.live().await?.press_enter(el).await
    }
}
