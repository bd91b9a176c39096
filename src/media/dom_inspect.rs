//! Strategy 2: walk the DOM for `<video>`/`<audio>` elements, their
//! `<source>` children, and media-hosting `<iframe>`s.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::browser_pool::TabHandle;

use super::{MediaSource, MediaStrategy, MediaType, score_confidence};

const PROBE_SCRIPT: &str = r#"
(() => {
  const out = [];
  document.querySelectorAll('video, audio').forEach(el => {
    const entry = {
      src: el.currentSrc || el.src || null,
      type: el.tagName.toLowerCase(),
      poster: el.poster || null,
      width: el.videoWidth || null,
      height: el.videoHeight || null,
      sources: [],
    };
    el.querySelectorAll('source').forEach(s => {
      entry.sources.push({ src: s.src, type: s.type || null });
    });
    out.push(entry);
  });
  document.querySelectorAll('iframe').forEach(f => {
    const src = f.src || '';
    if (/youtube|vimeo|dailymotion|player/i.test(src)) {
      out.push({ src, type: 'iframe', poster: null, width: null, height: null, sources: [] });
    }
  });
  return out;
})()
"#;

#[derive(Debug, Deserialize)]
struct MediaSourceTag {
    src: String,
    #[serde(rename = "type")]
    source_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MediaElement {
    src: Option<String>,
    #[serde(rename = "type")]
    tag: String,
    width: Option<u32>,
    height: Option<u32>,
    sources: Vec<MediaSourceTag>,
}

pub struct DomInspectStrategy;

#[async_trait]
impl MediaStrategy for DomInspectStrategy {
    fn name(&self) -> &'static str {
        "dom_inspect"
    }

    async fn extract(&self, tab: &TabHandle, page_url: &str) -> anyhow::Result<Vec<MediaSource>> {
        let value = tab.execute_script(PROBE_SCRIPT, Duration::from_secs(10)).await?;
        let elements: Vec<MediaElement> = serde_json::from_value(value)?;

        let mut sources = Vec::new();
        for element in elements {
            let media_type = match element.tag.as_str() {
                "video" | "iframe" => MediaType::Video,
                "audio" => MediaType::Audio,
                _ => MediaType::Unknown,
            };

            if let Some(src) = element.src {
                sources.push(build(&src, media_type, element.width, element.height, page_url, 0.7));
            }

            for source_tag in element.sources {
                sources.push(build(
                    &source_tag.src,
                    media_type,
                    element.width,
                    element.height,
                    page_url,
                    0.8,
                ));
            }
        }

        Ok(sources)
    }
}

fn build(
    url: &str,
    media_type: MediaType,
    width: Option<u32>,
    height: Option<u32>,
    page_url: &str,
    base_confidence: f32,
) -> MediaSource {
    let boosted = score_confidence(url, None).max(base_confidence);
    MediaSource {
        url: url.to_string(),
        media_type,
        mime_type: None,
        quality: None,
        resolution: width.zip(height),
        size: None,
        method: "dom_inspect".to_string(),
        referer: Some(page_url.to_string()),
        confidence: boosted,
    }
}
