use async_trait::async_trait;
use gembridge_core::{Error, Result};
use serde::de::DeserializeOwned;
use tracing::info;

use super::client::CdpConnection;
use super::protocol::{select_page, PageInfo};
use super::scripts;
use crate::page::{ChatPage, ElementInfo, ElementRef};

/// A chat tab in a Chromium browser reached over CDP.
pub struct CdpPage {
    conn: CdpConnection,
    url: String,
}

impl CdpPage {
    /// Find the first tab whose URL contains `page_match` and attach to it.
    pub async fn discover(endpoint: &str, page_match: &str) -> Result<Self> {
        let list_url = format!("{}/json/list", endpoint.trim_end_matches('/'));
        let pages: Vec<PageInfo> = reqwest::get(&list_url)
            .await
            .map_err(|e| Error::Transport(format!("{}: {}", list_url, e)))?
            .json()
            .await
            .map_err(|e| Error::Transport(format!("{}: {}", list_url, e)))?;

        let page = select_page(&pages, page_match).ok_or_else(|| {
            Error::Page(format!("no open tab matching {:?} at {}", page_match, endpoint))
        })?;
        let ws_url = page
            .web_socket_debugger_url
            .as_deref()
            .ok_or_else(|| Error::Page(format!("tab {} has no debugger url", page.id)))?;

        info!("Attaching to tab {:?} ({})", page.title, page.url);
        Ok(Self {
            conn: CdpConnection::connect(ws_url).await?,
            url: page.url.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn eval<T: DeserializeOwned>(&self, js: &str) -> Result<T> {
        let value = self.conn.evaluate(js).await?;
        serde_json::from_value(value)
            .map_err(|e| Error::Page(format!("unexpected page result: {}", e)))
    }

    async fn eval_unit(&self, js: &str) -> Result<()> {
        self.conn.evaluate(js).await.map(|_| ())
    }
}

#[async_trait]
impl ChatPage for CdpPage {
    async fn query_all(&self, selector: &str) -> Result<Vec<ElementRef>> {
        let ids: Vec<String> = self.eval(&scripts::query_all(selector)).await?;
        Ok(ids.into_iter().map(ElementRef).collect())
    }

    async fn element_info(&self, el: &ElementRef) -> Result<ElementInfo> {
        self.eval(&scripts::element_info(&el.0)).await
    }

    async fn element_text(&self, el: &ElementRef) -> Result<String> {
        self.eval(&scripts::element_text(&el.0)).await
    }

    async fn code_block_texts(&self, el: &ElementRef) -> Result<Vec<String>> {
        self.eval(&scripts::code_block_texts(&el.0)).await
    }

    async fn body_text(&self) -> Result<String> {
        self.eval(&scripts::body_text()).await
    }

    async fn focus(&self, el: &ElementRef) -> Result<()> {
        self.eval_unit(&scripts::focus(&el.0)).await
    }

    async fn insert_text(&self, el: &ElementRef, text: &str) -> Result<()> {
        self.eval_unit(&scripts::insert_text(&el.0, text)).await
    }

    async fn dispatch_input_events(&self, el: &ElementRef) -> Result<()> {
        self.eval_unit(&scripts::dispatch_input_events(&el.0)).await
    }

    async fn pointer_click(&self, el: &ElementRef) -> Result<()> {
        self.eval_unit(&scripts::pointer_click(&el.0)).await
    }

    async fn press_enter(&self, el: &ElementRef) -> Result<()> {
        self.eval_unit(&scripts::press_enter(&el.0)).await
    }

    /// The tab was closed, reloaded away or the browser went away.
    fn is_closed(&self) -> bool {
        self.conn.is_closed()
    }
}
