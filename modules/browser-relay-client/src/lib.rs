pub mod error;

pub use error::{CaptureError, Result};

use std::time::Duration;

use serde::Deserialize;

/// Opaque handle to a DOM element held by the relay session. Valid until the
/// next navigation.
pub type ElementHandle = String;

#[derive(Debug, Deserialize)]
struct WaitResponse {
    found: bool,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    handles: Vec<ElementHandle>,
}

#[derive(Debug, Deserialize)]
struct TextResponse {
    text: String,
}

#[derive(Debug, Deserialize)]
struct AttributeResponse {
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClickResponse {
    clicked: bool,
}

/// HTTP client for the browser relay's session API. One relay session drives
/// one logged-in browser; all calls operate on its current page.
pub struct BrowserRelayClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl BrowserRelayClient {
    pub fn new(base_url: &str, token: Option<&str>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(String::from),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        let mut endpoint = format!("{}/{path}", self.base_url);
        if let Some(ref token) = self.token {
            endpoint.push_str(&format!("?token={token}"));
        }
        endpoint
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T> {
        let resp = self
            .client
            .post(self.endpoint(path))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(CaptureError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(resp.json().await?)
    }

    /// Navigate the session's page and wait for the load to settle.
    pub async fn navigate(&self, url: &str) -> Result<()> {
        let _: serde_json::Value = self
            .post("navigate", serde_json::json!({ "url": url }))
            .await?;
        Ok(())
    }

    /// Wait until at least one element matches, or the timeout elapses.
    /// Returns whether a match appeared.
    pub async fn wait_for_element(&self, selector: &str, timeout_ms: u64) -> Result<bool> {
        let resp: WaitResponse = self
            .post(
                "wait-for",
                serde_json::json!({ "selector": selector, "timeout_ms": timeout_ms }),
            )
            .await?;
        Ok(resp.found)
    }

    /// All elements currently matching `selector`, scoped to `root` when
    /// given, page-wide otherwise.
    pub async fn query_all(
        &self,
        root: Option<&ElementHandle>,
        selector: &str,
    ) -> Result<Vec<ElementHandle>> {
        let resp: QueryResponse = self
            .post(
                "query-all",
                serde_json::json!({ "root": root, "selector": selector }),
            )
            .await?;
        Ok(resp.handles)
    }

    /// Rendered inner text of an element.
    pub async fn get_text(&self, handle: &ElementHandle) -> Result<String> {
        let resp: TextResponse = self
            .post("text", serde_json::json!({ "handle": handle }))
            .await?;
        Ok(resp.text)
    }

    /// Attribute value of an element, `None` when absent.
    pub async fn get_attribute(
        &self,
        handle: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>> {
        let resp: AttributeResponse = self
            .post(
                "attribute",
                serde_json::json!({ "handle": handle, "name": name }),
            )
            .await?;
        Ok(resp.value)
    }

    /// Scroll the page by a pixel delta.
    pub async fn scroll_by(&self, pixels: i64) -> Result<()> {
        let _: serde_json::Value = self
            .post("scroll", serde_json::json!({ "pixels": pixels }))
            .await?;
        Ok(())
    }

    /// Click an element. Returns whether the click landed within the timeout;
    /// a stale or detached handle reports `false` rather than an error.
    pub async fn click(&self, handle: &ElementHandle, timeout_ms: u64) -> Result<bool> {
        let resp: ClickResponse = self
            .post(
                "click",
                serde_json::json!({ "handle": handle, "timeout_ms": timeout_ms }),
            )
            .await?;
        Ok(resp.clicked)
    }
}
