//! Per-tab handle and operations
//!
//! A `TabHandle` is checked out from a `PooledBrowser` and returned (by navigating
//! back to `about:blank`) when dropped. Every operation here carries its own timeout.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, CaptureScreenshotParams,
};
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::timeout;

use super::browser::PooledBrowser;
use super::error::BrowserPoolError;

/// A single network request/response observed on a tab, kept for structured error reporting.
#[derive(Debug, Clone)]
pub struct NetworkLogEntry {
    pub url: String,
    pub method: String,
    pub status: Option<i64>,
    pub mime_type: Option<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// A tab slot owned by a `PooledBrowser`.
pub(super) struct PooledTab {
    pub id: u64,
    pub page: Page,
    pub busy: bool,
    pub last_used: Instant,
    pub network_log: Arc<AsyncMutex<Vec<NetworkLogEntry>>>,
}

impl PooledTab {
    pub(super) fn touch(&mut self) {
        self.last_used = Instant::now();
    }
}

/// Selector/attribute extraction kind requested by a processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractKind {
    Text,
    Html,
    Attribute,
}

/// A structured error produced by `handle_network_error`, bundling page state for diagnosis.
#[derive(Debug, Clone)]
pub struct TabNetworkError {
    pub url: String,
    pub html_snippet: String,
    pub screenshot: Option<Vec<u8>>,
    pub network_log: Vec<NetworkLogEntry>,
}

/// A checked-out tab. Navigates back to `about:blank` on drop (best-effort, 5s bound).
pub struct TabHandle {
    pub(super) browser: Arc<PooledBrowser>,
    pub(super) tab_id: u64,
    pub(super) page: Page,
    pub(super) network_log: Arc<AsyncMutex<Vec<NetworkLogEntry>>>,
}

impl TabHandle {
    #[must_use]
    pub fn id(&self) -> u64 {
        self.tab_id
    }

    /// Navigate to `url`, bounded by `op_timeout`.
    pub async fn navigate(&self, url: &str, op_timeout: Duration) -> Result<(), BrowserPoolError> {
        timeout(op_timeout, self.page.goto(url))
            .await
            .map_err(|_| BrowserPoolError::Timeout(op_timeout))?
            .map_err(|e| BrowserPoolError::TabFailed(e.to_string()))?;
        Ok(())
    }

    /// Return the page's current HTML content.
    pub async fn get_html(&self, op_timeout: Duration) -> Result<String, BrowserPoolError> {
        timeout(op_timeout, self.page.content())
            .await
            .map_err(|_| BrowserPoolError::Timeout(op_timeout))?
            .map_err(|e| BrowserPoolError::TabFailed(e.to_string()))
    }

    /// Extract `text`, `html`, or an `attribute` value from the first element matching `selector`.
    pub async fn extract_content(
        &self,
        selector: &str,
        attribute: Option<&str>,
        kind: ExtractKind,
        op_timeout: Duration,
    ) -> Result<Option<String>, BrowserPoolError> {
        let find = timeout(op_timeout, self.page.find_element(selector)).await;
        let element = match find {
            Ok(Ok(el)) => el,
            Ok(Err(_)) => return Ok(None),
            Err(_) => return Err(BrowserPoolError::Timeout(op_timeout)),
        };

        let value = match kind {
            ExtractKind::Text => element
                .inner_text()
                .await
                .map_err(|e| BrowserPoolError::TabFailed(e.to_string()))?,
            ExtractKind::Html => element
                .outer_html()
                .await
                .map_err(|e| BrowserPoolError::TabFailed(e.to_string()))?,
            ExtractKind::Attribute => {
                let attr = attribute.unwrap_or("href");
                element
                    .attribute(attr)
                    .await
                    .map_err(|e| BrowserPoolError::TabFailed(e.to_string()))?
            }
        };

        Ok(value)
    }

    /// Evaluate a JavaScript expression and return its JSON-serialized result.
    pub async fn execute_script(
        &self,
        script: &str,
        op_timeout: Duration,
    ) -> Result<serde_json::Value, BrowserPoolError> {
        let result = timeout(op_timeout, self.page.evaluate(script))
            .await
            .map_err(|_| BrowserPoolError::Timeout(op_timeout))?
            .map_err(|e| BrowserPoolError::TabFailed(e.to_string()))?;

        result
            .into_value()
            .map_err(|e| BrowserPoolError::TabFailed(e.to_string()))
    }

    /// Capture a full-page PNG screenshot.
    pub async fn take_screenshot(&self, op_timeout: Duration) -> Result<Vec<u8>, BrowserPoolError> {
        let params = CaptureScreenshotParams {
            quality: Some(90),
            format: Some(CaptureScreenshotFormat::Png),
            capture_beyond_viewport: Some(true),
            ..Default::default()
        };

        timeout(op_timeout, self.page.screenshot(params))
            .await
            .map_err(|_| BrowserPoolError::Timeout(op_timeout))?
            .map_err(|e| BrowserPoolError::TabFailed(e.to_string()))
    }

    /// Click the first element matching `selector`.
    pub async fn click(&self, selector: &str, op_timeout: Duration) -> Result<(), BrowserPoolError> {
        let element = timeout(op_timeout, self.page.find_element(selector))
            .await
            .map_err(|_| BrowserPoolError::Timeout(op_timeout))?
            .map_err(|e| BrowserPoolError::TabFailed(e.to_string()))?;

        element
            .click()
            .await
            .map_err(|e| BrowserPoolError::TabFailed(e.to_string()))?;
        Ok(())
    }

    /// Poll for `selector` to appear, returning once found or timing out.
    pub async fn wait_for_element(
        &self,
        selector: &str,
        op_timeout: Duration,
    ) -> Result<(), BrowserPoolError> {
        let deadline = Instant::now() + op_timeout;
        loop {
            if self.page.find_element(selector).await.is_ok() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(BrowserPoolError::Timeout(op_timeout));
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Package current HTML, a best-effort screenshot, and the recorded network log
    /// into a structured error for diagnosis by the caller.
    pub async fn handle_network_error(&self, url: &str) -> TabNetworkError {
        let html = self
            .get_html(Duration::from_secs(5))
            .await
            .unwrap_or_default();
        let html_snippet =
            crate::utils::string_utils::safe_truncate_chars(&html, 500).to_string();

        let screenshot = self.take_screenshot(Duration::from_secs(5)).await.ok();
        let network_log = self.network_log.lock().await.clone();

        TabNetworkError {
            url: url.to_string(),
            html_snippet,
            screenshot,
            network_log,
        }
    }

    /// Record a network event for this tab (called by the media strategy engine's
    /// network-sniff pass while it owns the same CDP event stream).
    pub async fn record_network_event(&self, entry: NetworkLogEntry) {
        self.network_log.lock().await.push(entry);
    }

    /// Snapshot of every network event recorded for this tab so far.
    pub async fn network_log_snapshot(&self) -> Vec<NetworkLogEntry> {
        self.network_log.lock().await.clone()
    }

    #[must_use]
    pub fn page(&self) -> &Page {
        &self.page
    }
}

impl Drop for TabHandle {
    fn drop(&mut self) {
        let browser = Arc::clone(&self.browser);
        let tab_id = self.tab_id;
        let page = self.page.clone();
        tokio::spawn(async move {
            browser.mark_tab_idle(tab_id).await;
            let _ = timeout(Duration::from_secs(5), page.goto("about:blank")).await;
        });
    }
}
