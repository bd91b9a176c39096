//! Fetch stage: prefer a headless-browser tab, fall back to plain HTTP.

use std::time::{Duration, Instant};

use chrono::Utc;

use crate::error::ProcessorError;
use crate::item::{Content, Item};
use crate::stage::StageDef;
use crate::stage::config::{FetchConfig, WaitUntil};

use super::ProcessorContext;

pub async fn process(
    ctx: &ProcessorContext,
    stage: &StageDef,
    cfg: &FetchConfig,
    item: Item,
) -> Result<Vec<Item>, ProcessorError> {
    let url = cfg.url.clone().unwrap_or_else(|| item.url.clone());
    let start = Instant::now();

    if !ctx.url_tracker.should_process_url(&url) {
        return Ok(vec![]);
    }

    match fetch_via_browser(ctx, stage, cfg, &url).await {
        Ok(html) => {
            ctx.url_tracker.mark_url_processed(&url, true);
            Ok(vec![finish(&item, &url, html, start)])
        }
        Err(browser_err) => match ctx.fetcher.fetch(&url).await {
            Ok(page) => {
                ctx.url_tracker.mark_url_processed(&url, true);
                Ok(vec![finish(&item, &url, page.body, start)])
            }
            Err(http_err) => {
                ctx.url_tracker.mark_url_processed(&url, false);
                if item.depth == 0 {
                    Err(ProcessorError::new(
                        stage.id.clone(),
                        stage.name.clone(),
                        format!(
                            "seed fetch failed: browser error ({browser_err}), http error ({http_err})"
                        ),
                    )
                    .with_url(url))
                } else {
                    tracing::warn!(url, %browser_err, %http_err, "non-seed fetch failed, dropping");
                    Ok(vec![])
                }
            }
        },
    }
}

async fn fetch_via_browser(
    ctx: &ProcessorContext,
    _stage: &StageDef,
    cfg: &FetchConfig,
    url: &str,
) -> anyhow::Result<String> {
    let tab = ctx.browser_pool.acquire_tab().await?;
    let timeout = cfg.timeout;

    tab.navigate(url, timeout).await?;

    if matches!(cfg.wait_until, Some(WaitUntil::NetworkIdle)) {
        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    let html = tab.get_html(Duration::from_secs(5)).await?;
    Ok(html)
}

fn finish(item: &Item, url: &str, html: String, start: Instant) -> Item {
    let content_length = html.len();
    let mut out = item.derive(url, Content::Text(html));
    out.set_metadata("fetchTime", Utc::now().to_rfc3339());
    out.set_data("contentLength", content_length as u64);
    out.set_data("fetchDurationMs", start.elapsed().as_millis() as u64);
    out
}
