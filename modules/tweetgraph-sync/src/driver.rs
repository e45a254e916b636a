use async_trait::async_trait;
use browser_relay_client::{BrowserRelayClient, CaptureError, ElementHandle};

use crate::traits::CaptureDriver;

/// Capture driver backed by the browser relay's session API.
pub struct RelayCaptureDriver {
    client: BrowserRelayClient,
}

impl RelayCaptureDriver {
    pub fn new(client: BrowserRelayClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CaptureDriver for RelayCaptureDriver {
    async fn navigate(&self, url: &str) -> Result<(), CaptureError> {
        self.client.navigate(url).await
    }

    async fn wait_for_element(
        &self,
        selector: &str,
        timeout_ms: u64,
    ) -> Result<bool, CaptureError> {
        self.client.wait_for_element(selector, timeout_ms).await
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<ElementHandle>, CaptureError> {
        self.client.query_all(None, selector).await
    }

    async fn query_within(
        &self,
        root: &ElementHandle,
        selector: &str,
    ) -> Result<Vec<ElementHandle>, CaptureError> {
        self.client.query_all(Some(root), selector).await
    }

    async fn get_text(&self, handle: &ElementHandle) -> Result<String, CaptureError> {
        self.client.get_text(handle).await
    }

    async fn get_attribute(
        &self,
        handle: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, CaptureError> {
        self.client.get_attribute(handle, name).await
    }

    async fn scroll_by(&self, pixels: i64) -> Result<(), CaptureError> {
        self.client.scroll_by(pixels).await
    }

    async fn click(&self, handle: &ElementHandle, timeout_ms: u64) -> Result<bool, CaptureError> {
        self.client.click(handle, timeout_ms).await
    }
}
