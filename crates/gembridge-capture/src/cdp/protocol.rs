//! CDP wire messages.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize)]
pub struct CdpRequest {
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct CdpResponse {
    pub id: Option<u64>,
    pub result: Option<Value>,
    pub error: Option<CdpErrorBody>,
    /// Set on events, which this backend ignores.
    pub method: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CdpErrorBody {
    pub code: i64,
    pub message: String,
}

/// Entry of the `/json/list` discovery endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub id: String,
    #[serde(rename = "type")]
    pub page_type: String,
    #[serde(default)]
    pub title: String,
    pub url: String,
    pub web_socket_debugger_url: Option<String>,
}

/// First page tab whose URL contains `needle`.
pub fn select_page<'a>(pages: &'a [PageInfo], needle: &str) -> Option<&'a PageInfo> {
    pages
        .iter()
        .find(|p| p.page_type == "page" && p.url.contains(needle) && p.web_socket_debugger_url.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let req = CdpRequest {
            id: 7,
            method: "Runtime.evaluate".into(),
            params: None,
        };
        assert_eq!(
            serde_json::to_string(&req).unwrap(),
            r#"{"id":7,"method":"Runtime.evaluate"}"#
        );
    }

    #[test]
    fn test_error_response() {
        let resp: CdpResponse = serde_json::from_str(
            r#"{"id":3,"error":{"code":-32000,"message":"Cannot find context"}}"#,
        )
        .unwrap();
        assert_eq!(resp.id, Some(3));
        assert_eq!(resp.error.unwrap().code, -32000);
    }

    #[test]
    fn test_select_page() {
        let pages: Vec<PageInfo> = serde_json::from_str(
            r#"[
                {"id":"a","type":"service_worker","url":"https://gemini.google.com/sw.js","webSocketDebuggerUrl":"ws://x/a"},
                {"id":"b","type":"page","title":"News","url":"https://news.example.com","webSocketDebuggerUrl":"ws://x/b"},
                {"id":"c","type":"page","title":"Gemini","url":"https://gemini.google.com/app","webSocketDebuggerUrl":"ws://x/c"}
            ]"#,
        )
        .unwrap();
        assert_eq!(select_page(&pages, "gemini.google.com").unwrap().id, "c");
        assert!(select_page(&pages, "chat.example.org").is_none());
    }
}
