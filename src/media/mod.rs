//! Media extraction strategy engine: run several independent strategies over
//! a page, then normalize, dedup, and rank the combined results.

pub mod dom_inspect;
pub mod manifest;
pub mod network_sniff;
pub mod script_injection;

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::browser_pool::TabHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Video,
    Audio,
    Image,
    Unknown,
}

/// A discovered playable URL with enough metadata to rank and dedup it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaSource {
    pub url: String,
    pub media_type: MediaType,
    pub mime_type: Option<String>,
    pub quality: Option<String>,
    pub resolution: Option<(u32, u32)>,
    pub size: Option<u64>,
    pub method: String,
    pub referer: Option<String>,
    pub confidence: f32,
}

const MEDIA_EXTENSIONS: &[&str] = &["mp4", "webm", "m3u8", "mpd", "mp3", "wav", "ogg", "mov", "avi"];
const MEDIA_KEYWORDS: &[&str] = &[
    "/media/", "/video/", "/audio/", "/stream/", "videoplayback", "manifest", "playlist",
];
const STRIP_QUERY_KEYS: &[&str] = &["token", "signature", "auth", "key", "time"];

#[must_use]
pub fn extension_is_media(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    MEDIA_EXTENSIONS.iter().any(|ext| path.to_ascii_lowercase().ends_with(&format!(".{ext}")))
}

#[must_use]
pub fn keyword_match_count(url: &str) -> usize {
    let lower = url.to_ascii_lowercase();
    MEDIA_KEYWORDS.iter().filter(|kw| lower.contains(*kw)).count()
}

#[must_use]
pub fn mime_is_media(mime: &str) -> bool {
    mime.starts_with("video/")
        || mime.starts_with("audio/")
        || mime == "application/x-mpegURL"
        || mime == "application/dash+xml"
}

/// Start at 0.5, +0.3 for an explicit media MIME, +0.2 for an explicit media
/// extension, +0.05 per keyword match, capped at 1.0.
#[must_use]
pub fn score_confidence(url: &str, mime: Option<&str>) -> f32 {
    let mut score = 0.5_f32;
    if mime.map(mime_is_media).unwrap_or(false) {
        score += 0.3;
    }
    if extension_is_media(url) {
        score += 0.2;
    }
    score += 0.05 * keyword_match_count(url) as f32;
    score.min(1.0)
}

/// Strip query parameters whose keys contain any of {token, signature, auth,
/// key, time}, for dedup purposes only (the returned `MediaSource::url`
/// retains the original).
#[must_use]
pub fn normalize_for_dedup(url: &str) -> String {
    let Ok(mut parsed) = url::Url::parse(url) else {
        return url.to_string();
    };
    let retained: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, _)| !STRIP_QUERY_KEYS.iter().any(|s| k.to_ascii_lowercase().contains(s)))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if retained.is_empty() {
        parsed.set_query(None);
    } else {
        parsed.query_pairs_mut().clear().extend_pairs(&retained);
    }
    parsed.set_fragment(None);
    parsed.to_string()
}

fn file_type_priority(url: &str) -> u32 {
    let path = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
    if path.ends_with(".mp4") {
        100
    } else if path.ends_with(".webm") {
        90
    } else if path.ends_with(".m3u8") {
        80
    } else if path.ends_with(".mpd") {
        70
    } else if path.ends_with(".ts") {
        60
    } else if path.ends_with(".mp3") {
        50
    } else {
        0
    }
}

fn resolution_score(source: &MediaSource) -> u64 {
    if let Some((w, h)) = source.resolution {
        return u64::from(w) * u64::from(h);
    }
    match source.quality.as_deref() {
        Some("high") => 1_000_000,
        Some("medium") => 500_000,
        Some("low") => 100_000,
        _ => 0,
    }
}

/// Dedup by normalized URL (first-seen wins) then sort by
/// (confidence desc, file-type priority desc, resolution desc, URL asc).
#[must_use]
pub fn normalize_dedup_rank(sources: Vec<MediaSource>) -> Vec<MediaSource> {
    let mut seen = HashSet::new();
    let mut deduped: Vec<MediaSource> = sources
        .into_iter()
        .filter(|s| seen.insert(normalize_for_dedup(&s.url)))
        .collect();

    deduped.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| file_type_priority(&b.url).cmp(&file_type_priority(&a.url)))
            .then_with(|| resolution_score(b).cmp(&resolution_score(a)))
            .then_with(|| a.url.cmp(&b.url))
    });

    deduped
}

/// One of the four independent extraction algorithms.
#[async_trait]
pub trait MediaStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    async fn extract(&self, tab: &TabHandle, page_url: &str) -> anyhow::Result<Vec<MediaSource>>;
}

#[derive(Debug, Clone)]
pub struct MediaEngineConfig {
    pub headless: bool,
}

impl Default for MediaEngineConfig {
    fn default() -> Self {
        Self { headless: true }
    }
}

/// Runs the configured strategies in order and merges their results.
pub struct MediaEngine {
    strategies: Vec<Box<dyn MediaStrategy>>,
}

impl MediaEngine {
    #[must_use]
    pub fn new() -> Self {
        Self {
            strategies: vec![
                Box::new(network_sniff::NetworkSniffStrategy),
                Box::new(dom_inspect::DomInspectStrategy),
                Box::new(script_injection::ScriptInjectionStrategy),
            ],
        }
    }

    pub async fn extract(&self, tab: &TabHandle, page_url: &str) -> Vec<MediaSource> {
        let mut all = Vec::new();
        for strategy in &self.strategies {
            match strategy.extract(tab, page_url).await {
                Ok(mut found) => all.append(&mut found),
                Err(e) => tracing::warn!(strategy = strategy.name(), error = %e, "media strategy failed"),
            }
        }

        let manifest_urls: Vec<String> = all
            .iter()
            .filter(|s| {
                let p = s.url.to_ascii_lowercase();
                p.ends_with(".m3u8") || p.ends_with(".mpd")
            })
            .map(|s| s.url.clone())
            .collect();

        for manifest_url in manifest_urls {
            match manifest::fetch_and_parse(&manifest_url, page_url).await {
                Ok(mut variants) => all.append(&mut variants),
                Err(e) => tracing::debug!(manifest_url, error = %e, "manifest parse failed"),
            }
        }

        normalize_dedup_rank(all)
    }
}

impl Default for MediaEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_caps_at_one() {
        let score = score_confidence("https://example.com/media/stream/videoplayback.mp4", Some("video/mp4"));
        assert!(score <= 1.0);
        assert!(score > 0.9);
    }

    #[test]
    fn dedup_strips_tracking_params() {
        let a = normalize_for_dedup("https://cdn.example.com/clip.mp4?token=abc");
        let b = normalize_for_dedup("https://cdn.example.com/clip.mp4?token=xyz");
        assert_eq!(a, b);
    }

    #[test]
    fn ranking_prefers_higher_confidence_then_file_type() {
        let sources = vec![
            MediaSource {
                url: "https://a.example.com/x.mp3".to_string(),
                media_type: MediaType::Audio,
                mime_type: None,
                quality: None,
                resolution: None,
                size: None,
                method: "test".to_string(),
                referer: None,
                confidence: 0.9,
            },
            MediaSource {
                url: "https://a.example.com/x.mp4".to_string(),
                media_type: MediaType::Video,
                mime_type: None,
                quality: None,
                resolution: None,
                size: None,
                method: "test".to_string(),
                referer: None,
                confidence: 0.9,
            },
        ];
        let ranked = normalize_dedup_rank(sources);
        assert_eq!(ranked[0].url, "https://a.example.com/x.mp4");
    }
}
