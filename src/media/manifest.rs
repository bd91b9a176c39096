//! Strategy 4: fetch and parse HLS (`.m3u8`) and DASH (`.mpd`) manifests
//! discovered by the other strategies.

use std::time::Duration;

use regex::Regex;
use reqwest::header::REFERER;
use url::Url;

use super::{MediaSource, MediaType};

const MANIFEST_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn fetch_and_parse(manifest_url: &str, page_url: &str) -> anyhow::Result<Vec<MediaSource>> {
    let client = reqwest::Client::builder().timeout(MANIFEST_TIMEOUT).build()?;
    let body = client
        .get(manifest_url)
        .header(REFERER, page_url)
        .send()
        .await?
        .text()
        .await?;

    if manifest_url.to_ascii_lowercase().ends_with(".m3u8") {
        Ok(parse_hls(&body, manifest_url, page_url))
    } else {
        Ok(parse_dash(&body, manifest_url, page_url))
    }
}

fn parse_hls(body: &str, manifest_url: &str, page_url: &str) -> Vec<MediaSource> {
    let mut sources = Vec::new();
    let mut lines = body.lines().peekable();

    while let Some(line) = lines.next() {
        if !line.starts_with("#EXT-X-STREAM-INF") {
            continue;
        }

        let bandwidth = extract_attr(line, "BANDWIDTH").and_then(|v| v.parse::<u64>().ok());
        let resolution = extract_attr(line, "RESOLUTION").and_then(|r| {
            let (w, h) = r.split_once('x')?;
            Some((w.parse().ok()?, h.parse().ok()?))
        });

        let Some(&variant_line) = lines.peek() else { continue };
        if variant_line.starts_with('#') {
            continue;
        }
        let variant_url = resolve(manifest_url, variant_line);

        sources.push(MediaSource {
            url: variant_url,
            media_type: MediaType::Video,
            mime_type: Some("application/x-mpegURL".to_string()),
            quality: None,
            resolution,
            size: bandwidth,
            method: "manifest".to_string(),
            referer: Some(page_url.to_string()),
            confidence: 0.85,
        });
    }

    sources
}

fn parse_dash(body: &str, manifest_url: &str, page_url: &str) -> Vec<MediaSource> {
    let mut sources = Vec::new();

    let Ok(rep_re) = Regex::new(r#"(?is)<Representation[^>]*mimeType="([^"]*)"[^>]*?(?:width="(\d+)")?[^>]*?(?:height="(\d+)")?[^>]*?(?:bandwidth="(\d+)")?[^>]*>.*?<BaseURL>([^<]+)</BaseURL>"#) else {
        return sources;
    };

    for caps in rep_re.captures_iter(body) {
        let mime = caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_default();
        let width = caps.get(2).and_then(|m| m.as_str().parse().ok());
        let height = caps.get(3).and_then(|m| m.as_str().parse().ok());
        let bandwidth = caps.get(4).and_then(|m| m.as_str().parse().ok());
        let base_url = caps.get(5).map(|m| m.as_str().trim()).unwrap_or_default();

        if base_url.is_empty() {
            continue;
        }

        let media_type = if mime.starts_with("video/") {
            MediaType::Video
        } else if mime.starts_with("audio/") {
            MediaType::Audio
        } else {
            MediaType::Unknown
        };

        sources.push(MediaSource {
            url: resolve(manifest_url, base_url),
            media_type,
            mime_type: Some(mime),
            quality: None,
            resolution: width.zip(height),
            size: bandwidth,
            method: "manifest".to_string(),
            referer: Some(page_url.to_string()),
            confidence: 0.85,
        });
    }

    sources
}

fn extract_attr<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let idx = line.find(key)?;
    let rest = &line[idx + key.len()..];
    let rest = rest.trim_start_matches('=');
    if let Some(stripped) = rest.strip_prefix('"') {
        let end = stripped.find('"')?;
        Some(&stripped[..end])
    } else {
        let end = rest.find(',').unwrap_or(rest.len());
        Some(rest[..end].trim())
    }
}

fn resolve(base: &str, link: &str) -> String {
    if link.contains("://") {
        return link.to_string();
    }
    Url::parse(base)
        .and_then(|b| b.join(link))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| link.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hls_stream_inf_variants() {
        let body = "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360\nlow.m3u8\n#EXT-X-STREAM-INF:BANDWIDTH=2000000,RESOLUTION=1280x720\nhigh.m3u8\n";
        let sources = parse_hls(body, "https://example.com/master.m3u8", "https://example.com/page");
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].url, "https://example.com/low.m3u8");
        assert_eq!(sources[0].resolution, Some((640, 360)));
        assert_eq!(sources[1].size, Some(2_000_000));
    }

    #[test]
    fn parses_dash_representation() {
        let body = r#"<MPD><AdaptationSet><Representation mimeType="video/mp4" width="1920" height="1080" bandwidth="3000000"><BaseURL>video.mp4</BaseURL></Representation></AdaptationSet></MPD>"#;
        let sources = parse_dash(body, "https://example.com/manifest.mpd", "https://example.com/page");
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].url, "https://example.com/video.mp4");
        assert_eq!(sources[0].resolution, Some((1920, 1080)));
    }
}
