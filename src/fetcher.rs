//! Plain HTTP fallback fetcher used when a browser tab is unavailable or
//! navigation fails.
//!
//! TLS errors are tolerated (many target sites carry misconfigured or
//! self-signed certs), gzip is handled transparently by `reqwest`, and a
//! cookie jar is kept per client so session-gated pages behave across
//! redirects within one fetch.

use std::time::Duration;

use reqwest::Client;
use reqwest::redirect::Policy;

use crate::error::PipelineError;

const MAX_REDIRECTS: usize = 10;
const MAX_RESPONSE_BYTES: usize = 10 * 1024 * 1024;
const RETRY_BACKOFFS: [Duration; 3] = [
    Duration::from_secs(2),
    Duration::from_secs(4),
    Duration::from_secs(6),
];

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/120.0.0.0 Safari/537.36";

/// A fetched response capped at 10 MiB, with the response body already
/// decoded to a UTF-8-lossy string (callers needing raw bytes should use
/// `fetch_bytes`).
pub struct FetchedPage {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
    pub content_length: usize,
}

#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Thin wrapper around a `reqwest::Client` carrying the crate's retry ladder.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(config: &FetcherConfig) -> Result<Self, PipelineError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .redirect(Policy::limited(MAX_REDIRECTS))
            .danger_accept_invalid_certs(true)
            .cookie_store(true)
            .gzip(true)
            .build()
            .map_err(|e| PipelineError::transient(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }

    /// GET `url`, retrying transient failures per the crate's 3-attempt
    /// 2-/4-/6-second back-off ladder. Truncates (does not error) bodies
    /// larger than the 10 MiB cap.
    pub async fn fetch(&self, url: &str) -> Result<FetchedPage, PipelineError> {
        let mut last_err = None;

        for (attempt, backoff) in std::iter::once(None)
            .chain(RETRY_BACKOFFS.iter().copied().map(Some))
            .enumerate()
        {
            if let Some(delay) = backoff {
                tokio::time::sleep(delay).await;
            }

            match self.fetch_once(url).await {
                Ok(page) => return Ok(page),
                Err(e) => {
                    tracing::debug!(url, attempt, error = %e, "fetch attempt failed");
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| PipelineError::transient_for_url(url, "fetch failed")))
    }

    async fn fetch_once(&self, url: &str) -> Result<FetchedPage, PipelineError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PipelineError::transient_for_url(url, e.to_string()))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| PipelineError::transient_for_url(url, e.to_string()))?;

        let truncated = bytes.len() > MAX_RESPONSE_BYTES;
        let slice = if truncated {
            &bytes[..MAX_RESPONSE_BYTES]
        } else {
            &bytes[..]
        };

        if truncated {
            tracing::warn!(url, original_len = bytes.len(), "response exceeded 10 MiB cap, truncating");
        }

        Ok(FetchedPage {
            url: url.to_string(),
            status,
            content_length: slice.len(),
            body: String::from_utf8_lossy(slice).into_owned(),
            content_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fetch_reads_mock_response() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/page")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<html>hi</html>")
            .create_async()
            .await;

        let fetcher = Fetcher::new(&FetcherConfig::default()).unwrap();
        let url = format!("{}/page", server.url());
        let page = fetcher.fetch(&url).await.unwrap();

        assert_eq!(page.status, 200);
        assert_eq!(page.body, "<html>hi</html>");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn fetch_retries_then_surfaces_error() {
        let fetcher = Fetcher::new(&FetcherConfig {
            timeout: Duration::from_millis(200),
            ..Default::default()
        })
        .unwrap();

        let result = fetcher.fetch("http://127.0.0.1:1/unreachable").await;
        assert!(result.is_err());
    }
}
