//! Strategy 3: probe known JS players and walk `window` for embedded media
//! URLs, plus scan raw `<script>` text for URL-like patterns.

use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;

use crate::browser_pool::TabHandle;

use super::{MediaSource, MediaStrategy, MediaType, score_confidence};

const PROBE_SCRIPT: &str = r#"
(() => {
  const found = [];
  const urlRe = /https?:\/\/[^\s"'<>]+\.(mp4|webm|m3u8|mpd)/gi;

  // Known players
  try {
    if (window.jwplayer) {
      const pl = window.jwplayer().getPlaylist ? window.jwplayer().getPlaylist() : [];
      (pl || []).forEach(item => (item.sources || []).forEach(s => found.push({ url: s.file, known: true })));
    }
  } catch (e) {}
  try {
    if (window.videojs) {
      document.querySelectorAll('video').forEach(v => {
        const player = window.videojs.getPlayer ? window.videojs.getPlayer(v) : null;
        if (player && player.currentSrc) found.push({ url: player.currentSrc(), known: true });
      });
    }
  } catch (e) {}

  // Shallow window walk (depth 3) for string props / sources arrays
  const visited = new Set();
  const walk = (obj, depth) => {
    if (!obj || depth > 3 || typeof obj !== 'object') return;
    if (visited.has(obj)) return;
    visited.add(obj);
    for (const key in obj) {
      let val;
      try { val = obj[key]; } catch (e) { continue; }
      if (typeof val === 'string' && urlRe.test(val)) {
        found.push({ url: val, known: false });
      } else if (Array.isArray(val) && key === 'sources') {
        val.forEach(s => { if (s && s.file) found.push({ url: s.file, known: false }); });
      } else if (typeof val === 'object') {
        walk(val, depth + 1);
      }
    }
  };
  try { walk(window, 0); } catch (e) {}

  // Script text scan
  document.querySelectorAll('script').forEach(s => {
    const text = s.textContent || '';
    const re = /(file|src|source|url)\s*[:=]\s*["']?(https?:\/\/[^\s"'<>]+\.(mp4|webm|m3u8|mpd))["']?/gi;
    let m;
    while ((m = re.exec(text)) !== null) {
      found.push({ url: m[2], known: false });
    }
  });

  return found;
})()
"#;

#[derive(Debug, Deserialize)]
struct FoundUrl {
    url: String,
    known: bool,
}

pub struct ScriptInjectionStrategy;

#[async_trait]
impl MediaStrategy for ScriptInjectionStrategy {
    fn name(&self) -> &'static str {
        "script_injection"
    }

    async fn extract(&self, tab: &TabHandle, page_url: &str) -> anyhow::Result<Vec<MediaSource>> {
        let value = tab.execute_script(PROBE_SCRIPT, Duration::from_secs(10)).await?;
        let found: Vec<FoundUrl> = serde_json::from_value(value)?;

        let url_pattern = Regex::new(r"(?i)https?://[^\s\x22\x27<>]+\.(mp4|webm|m3u8|mpd)")?;

        let sources = found
            .into_iter()
            .filter(|f| url_pattern.is_match(&f.url))
            .map(|f| {
                let base_confidence = if f.known { 0.9 } else { 0.6 };
                MediaSource {
                    url: f.url.clone(),
                    media_type: MediaType::Video,
                    mime_type: None,
                    quality: None,
                    resolution: None,
                    size: None,
                    method: "script_injection".to_string(),
                    referer: Some(page_url.to_string()),
                    confidence: score_confidence(&f.url, None).max(base_confidence),
                }
            })
            .collect();

        Ok(sources)
    }
}
