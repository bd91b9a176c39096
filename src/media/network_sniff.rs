//! Strategy 1: watch the tab's network traffic during navigation and after a
//! settle period, classifying responses that look like media.
//!
//! Also simulates user interaction (clicking common play-button selectors,
//! calling `HTMLMediaElement.play()` on every `<video>`, and dispatching a
//! center-of-viewport click) to unlock lazy playback that only starts after
//! a gesture, including players with no selector-matchable play button.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::EventResponseReceived;
use futures::StreamExt;

use crate::browser_pool::{NetworkLogEntry, TabHandle};

use super::{MediaSource, MediaStrategy, MediaType, mime_is_media, score_confidence};

const NETWORK_BUDGET: Duration = Duration::from_secs(45);
const SETTLE: Duration = Duration::from_secs(5);

const PLAY_BUTTON_SELECTORS: &[&str] = &[
    ".play-button",
    ".vjs-big-play-button",
    "[aria-label='Play']",
    "button.play",
];

pub struct NetworkSniffStrategy;

#[async_trait]
impl MediaStrategy for NetworkSniffStrategy {
    fn name(&self) -> &'static str {
        "network_sniff"
    }

    async fn extract(&self, tab: &TabHandle, page_url: &str) -> anyhow::Result<Vec<MediaSource>> {
        // Subscribe before navigating so the response event for the initial
        // load itself is observed, not just subsequent XHR/media requests.
        let mut events = tab.page().event_listener::<EventResponseReceived>().await?;

        let collector = tokio::spawn(async move {
            let mut collected = Vec::new();
            let deadline = tokio::time::Instant::now() + NETWORK_BUDGET;
            loop {
                let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
                if remaining.is_zero() {
                    break;
                }
                match tokio::time::timeout(remaining, events.next()).await {
                    Ok(Some(event)) => collected.push(event),
                    Ok(None) | Err(_) => break,
                }
            }
            collected
        });

        let _ = tab.navigate(page_url, Duration::from_secs(30)).await;
        simulate_playback_gestures(tab).await;
        tokio::time::sleep(SETTLE).await;

        let raw_events = collector.await.unwrap_or_default();

        let mut sources = Vec::new();
        for event in raw_events {
            let response = &event.response;
            let url = response.url.clone();
            let mime = response.mime_type.clone();

            tab.record_network_event(NetworkLogEntry {
                url: url.clone(),
                method: "GET".to_string(),
                status: Some(response.status),
                mime_type: Some(mime.clone()),
                timestamp: chrono::Utc::now(),
            })
            .await;

            if !super::extension_is_media(&url) && !mime_is_media(&mime) && super::keyword_match_count(&url) == 0 {
                continue;
            }

            let confidence = score_confidence(&url, Some(&mime));
            sources.push(MediaSource {
                url,
                media_type: classify(&mime),
                mime_type: Some(mime),
                quality: None,
                resolution: None,
                size: None,
                method: self.name().to_string(),
                referer: Some(page_url.to_string()),
                confidence,
            });
        }

        Ok(sources)
    }
}

async fn simulate_playback_gestures(tab: &TabHandle) {
    for selector in PLAY_BUTTON_SELECTORS {
        let _ = tab.click(selector, Duration::from_millis(500)).await;
    }
    let _ = tab
        .execute_script(
            "document.querySelectorAll('video').forEach(v => v.play().catch(() => {}));",
            Duration::from_secs(2),
        )
        .await;
    // Players with no selector-matchable play button often still listen for
    // a generic click anywhere over the player; a centered synthetic click
    // stands a decent chance of landing on one without knowing its markup.
    let _ = tab
        .execute_script(
            "const x = window.innerWidth / 2, y = window.innerHeight / 2;\
             const target = document.elementFromPoint(x, y);\
             if (target) {\
                 ['mousedown', 'mouseup', 'click'].forEach(type => \
                     target.dispatchEvent(new MouseEvent(type, { bubbles: true, cancelable: true, clientX: x, clientY: y })));\
             }",
            Duration::from_secs(2),
        )
        .await;
}

fn classify(mime: &str) -> MediaType {
    if mime.starts_with("video/") || mime == "application/x-mpegURL" || mime == "application/dash+xml" {
        MediaType::Video
    } else if mime.starts_with("audio/") {
        MediaType::Audio
    } else if mime.starts_with("image/") {
        MediaType::Image
    } else {
        MediaType::Unknown
    }
}
