//! Transform stage: JSON parse, whitespace trim, regex replace/extract, or
//! URL normalization.

use regex::Regex;
use url::Url;

use crate::error::ProcessorError;
use crate::item::{Content, Item};
use crate::stage::StageDef;
use crate::stage::config::{TransformConfig, TransformType};

pub fn process(stage: &StageDef, cfg: &TransformConfig, mut item: Item) -> Result<Vec<Item>, ProcessorError> {
    match cfg.transform_type {
        TransformType::Json => {
            let text = item.content.as_text().unwrap_or_default();
            let value: serde_json::Value = serde_json::from_str(text).map_err(|e| {
                ProcessorError::new(
                    stage.id.clone(),
                    stage.name.clone(),
                    format!("invalid JSON: {e}"),
                )
                .with_url(item.url.clone())
            })?;
            if let serde_json::Value::Object(map) = value {
                for (k, v) in map {
                    item.data.insert(k, v);
                }
            } else {
                item.data.insert("value".to_string(), value);
            }
        }
        TransformType::Trim => {
            if let Some(text) = item.content.as_text() {
                item.content = Content::Text(text.trim().to_string());
            }
        }
        TransformType::Replace => {
            let pattern = cfg.pattern.as_deref().unwrap_or("");
            let replacement = cfg.replacement.as_deref().unwrap_or("");
            let regex = Regex::new(pattern).map_err(|e| {
                ProcessorError::new(
                    stage.id.clone(),
                    stage.name.clone(),
                    format!("invalid replace pattern '{pattern}': {e}"),
                )
                .with_url(item.url.clone())
            })?;
            if let Some(text) = item.content.as_text() {
                item.content = Content::Text(regex.replace_all(text, replacement).into_owned());
            }
        }
        TransformType::Extract => {
            let pattern = cfg.pattern.as_deref().unwrap_or("");
            let regex = Regex::new(pattern).map_err(|e| {
                ProcessorError::new(
                    stage.id.clone(),
                    stage.name.clone(),
                    format!("invalid extract pattern '{pattern}': {e}"),
                )
                .with_url(item.url.clone())
            })?;
            if let Some(text) = item.content.as_text()
                && let Some(m) = regex.find(text)
            {
                item.content = Content::Text(m.as_str().to_string());
            }
        }
        TransformType::NormalizeUrl => {
            let raw = if cfg.field == "url" {
                item.url.clone()
            } else {
                item.content.as_text().unwrap_or_default().to_string()
            };
            let normalized = normalize_url(&raw).map_err(|e| {
                ProcessorError::new(stage.id.clone(), stage.name.clone(), e).with_url(item.url.clone())
            })?;
            if cfg.field == "url" {
                item.url = normalized;
            } else {
                item.content = Content::Text(normalized);
            }
        }
    }

    Ok(vec![item])
}

fn normalize_url(raw: &str) -> Result<String, String> {
    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    };

    let mut url = Url::parse(&with_scheme).map_err(|e| format!("invalid URL '{raw}': {e}"))?;
    url.set_fragment(None);

    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if retained.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(&retained);
    }

    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::normalize_url;

    #[test]
    fn normalize_adds_https_scheme() {
        assert_eq!(normalize_url("example.com/page").unwrap(), "https://example.com/page");
    }

    #[test]
    fn normalize_drops_fragment_and_empty_query() {
        let out = normalize_url("https://example.com/page?empty=#frag").unwrap();
        assert_eq!(out, "https://example.com/page");
    }

    #[test]
    fn normalize_keeps_non_empty_query() {
        let out = normalize_url("https://example.com/page?id=5").unwrap();
        assert_eq!(out, "https://example.com/page?id=5");
    }
}
