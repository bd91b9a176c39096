//! Store stage: persist an item's content to the workspace, optionally
//! generating a thumbnail and/or an asset record.

use chrono::Utc;

use crate::error::ProcessorError;
use crate::external::{Asset, MediaKind};
use crate::item::Item;
use crate::stage::StageDef;
use crate::stage::config::StoreConfig;

use super::ProcessorContext;

const EXTENSION_MIME_MAP: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
    ("video/mp4", "mp4"),
    ("video/webm", "webm"),
    ("audio/mpeg", "mp3"),
    ("application/pdf", "pdf"),
    ("application/json", "json"),
    ("text/html", "html"),
];

pub async fn process(
    ctx: &ProcessorContext,
    stage: &StageDef,
    cfg: &StoreConfig,
    item: Item,
) -> Result<Vec<Item>, ProcessorError> {
    if let Some(max_assets) = ctx.max_assets
        && ctx.asset_count.load(std::sync::atomic::Ordering::Relaxed) >= u64::from(max_assets)
    {
        return Ok(vec![]);
    }

    let _permit = ctx.asset_permits.acquire().await.map_err(|_| {
        ProcessorError::new(stage.id.clone(), stage.name.clone(), "asset worker pool closed")
            .with_url(item.url.clone())
    })?;

    let bytes = match &item.content {
        crate::item::Content::Bytes(b) => b.clone(),
        crate::item::Content::Text(s) => s.as_bytes().to_vec(),
        crate::item::Content::Empty => Vec::new(),
    };

    let dir = ctx.workspace.storage_path(&ctx.job_id).join(&cfg.path);
    tokio::fs::create_dir_all(&dir).await.map_err(|e| {
        ProcessorError::new(stage.id.clone(), stage.name.clone(), format!("failed to create {dir:?}: {e}"))
            .with_url(item.url.clone())
    })?;

    let extension = resolve_extension(&item, &bytes);
    let filename = build_filename(&item, cfg.filename_template.as_deref(), &extension);
    let file_path = dir.join(&filename);

    tokio::fs::write(&file_path, &bytes).await.map_err(|e| {
        ProcessorError::new(stage.id.clone(), stage.name.clone(), format!("failed to write {file_path:?}: {e}"))
            .with_url(item.url.clone())
    })?;
    ctx.asset_count.fetch_add(1, std::sync::atomic::Ordering::Relaxed);

    let mut out = item.clone();
    out.set_data("filePath", file_path.display().to_string());
    out.set_data("relativePath", cfg.path.clone() + "/" + &filename);

    if cfg.thumbnail {
        let kind = classify_for_thumbnail(&extension);
        match ctx.thumbnails.generate(&file_path, kind).await {
            Ok(thumb_path) => out.set_data("thumbnailPath", thumb_path.display().to_string()),
            Err(e) => tracing::warn!(url = %item.url, error = %e, "thumbnail generation failed"),
        }
    }

    if cfg.as_asset {
        let asset = Asset {
            id: out.id.clone(),
            job_id: ctx.job_id.clone(),
            url: item.url.clone(),
            asset_type: extension.clone(),
            size: Some(bytes.len() as u64),
            local_path: Some(file_path.display().to_string()),
            thumbnail_path: out.data.get("thumbnailPath").and_then(|v| v.as_str()).map(str::to_string),
            title: out.metadata.get("title").cloned(),
            description: out.metadata.get("description").cloned(),
            author: out.metadata.get("author").cloned(),
            date: Some(Utc::now().to_rfc3339()),
            metadata: out.metadata.clone(),
            downloaded: true,
            error: None,
        };

        ctx.job_store.add_asset(&ctx.job_id, &asset).await.map_err(|e| {
            ProcessorError::new(stage.id.clone(), stage.name.clone(), format!("failed to persist asset: {e}"))
                .with_url(item.url.clone())
        })?;
    }

    Ok(vec![out])
}

fn resolve_extension(item: &Item, bytes: &[u8]) -> String {
    if let Some(content_type) = item.metadata.get("contentType")
        && let Some((_, ext)) = EXTENSION_MIME_MAP.iter().find(|(mime, _)| content_type.starts_with(mime))
    {
        return (*ext).to_string();
    }

    if let Some(ext) = item.url.rsplit('.').next().filter(|e| e.len() <= 5 && e.chars().all(char::is_alphanumeric)) {
        return ext.to_ascii_lowercase();
    }

    sniff_signature(bytes).unwrap_or_else(|| "bin".to_string())
}

fn sniff_signature(bytes: &[u8]) -> Option<String> {
    let sig = |prefix: &[u8]| bytes.starts_with(prefix);
    if sig(&[0xFF, 0xD8, 0xFF]) {
        Some("jpg".to_string())
    } else if sig(b"\x89PNG\r\n\x1a\n") {
        Some("png".to_string())
    } else if sig(b"GIF8") {
        Some("gif".to_string())
    } else if bytes.len() > 4 && &bytes[..4] == b"\x1a\x45\xdf\xa3" {
        Some("webm".to_string())
    } else if sig(b"%PDF") {
        Some("pdf".to_string())
    } else if bytes.first() == Some(&b'{') || bytes.first() == Some(&b'[') {
        Some("json".to_string())
    } else if bytes.windows(5).any(|w| w.eq_ignore_ascii_case(b"<html")) {
        Some("html".to_string())
    } else {
        None
    }
}

fn classify_for_thumbnail(extension: &str) -> MediaKind {
    match extension {
        "jpg" | "jpeg" | "png" | "gif" | "webp" => MediaKind::Image,
        "mp4" | "webm" | "mov" | "avi" => MediaKind::Video,
        "pdf" => MediaKind::Pdf,
        _ => MediaKind::Generic,
    }
}

fn build_filename(item: &Item, template: Option<&str>, extension: &str) -> String {
    let raw = match template {
        Some(t) => apply_template(t, item),
        None => item.id.clone(),
    };
    let sanitized = sanitize_filename::sanitize(raw);
    format!("{sanitized}.{extension}")
}

fn apply_template(template: &str, item: &Item) -> String {
    let mut result = template
        .replace("{{id}}", &item.id)
        .replace("{{timestamp}}", &Utc::now().timestamp().to_string())
        .replace("{{depth}}", &item.depth.to_string());

    let mut placeholders: Vec<(String, String)> = item
        .metadata
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    placeholders.extend(
        item.data
            .iter()
            .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string()))),
    );

    for (key, value) in placeholders {
        result = result.replace(&format!("{{{{{key}}}}}"), &value);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniff_signature_detects_png() {
        let bytes = b"\x89PNG\r\n\x1a\nrest".to_vec();
        assert_eq!(sniff_signature(&bytes), Some("png".to_string()));
    }

    #[test]
    fn sniff_signature_returns_none_for_unknown() {
        assert_eq!(sniff_signature(b"random bytes"), None);
    }

    #[test]
    fn build_filename_sanitizes_template() {
        let item = Item::seed("https://example.com");
        let name = build_filename(&item, Some("{{id}}"), "bin");
        assert!(name.ends_with(".bin"));
        assert!(!name.contains('/'));
    }
}
