//! Pagination stage: follow a "next page" link, preserving depth.

use url::Url;

use crate::error::ProcessorError;
use crate::item::{Content, Item};
use crate::stage::StageDef;
use crate::stage::config::PaginationConfig;

pub fn process(stage: &StageDef, cfg: &PaginationConfig, item: Item) -> Result<Vec<Item>, ProcessorError> {
    let next_url = item
        .content
        .as_text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            ProcessorError::new(stage.id.clone(), stage.name.clone(), "pagination requires link text")
                .with_url(item.url.clone())
        })?;

    let resolved = resolve(&item.url, next_url).map_err(|e| {
        ProcessorError::new(stage.id.clone(), stage.name.clone(), e).with_url(item.url.clone())
    })?;

    if resolved == item.url {
        return Ok(vec![]);
    }

    let page_num = item
        .data
        .get("pageNum")
        .and_then(serde_json::Value::as_u64)
        .unwrap_or(1);

    if page_num >= u64::from(cfg.max_pages) {
        return Ok(vec![]);
    }

    let mut next = item.derive(resolved, Content::Empty);
    next.depth = item.depth;
    next.set_data("pageNum", page_num + 1);
    Ok(vec![next])
}

fn resolve(base: &str, link: &str) -> Result<String, String> {
    if link.contains("://") {
        return Ok(link.to_string());
    }
    let base = Url::parse(base).map_err(|e| format!("invalid base URL '{base}': {e}"))?;
    base.join(link)
        .map(|u| u.to_string())
        .map_err(|e| format!("could not resolve '{link}' against '{base}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::StageType;
    use crate::stage::config::{OnError, StageConfig};

    fn stage(max_pages: u32) -> (StageDef, PaginationConfig) {
        let cfg = PaginationConfig { selector: "a.next".to_string(), max_pages };
        let def = StageDef {
            id: "pagination".to_string(),
            name: "pagination".to_string(),
            stage_type: StageType::Pagination,
            config: StageConfig::Pagination(cfg.clone()),
            next_stages: vec![],
            concurrency: 1,
            on_error: OnError::Continue,
        };
        (def, cfg)
    }

    #[test]
    fn pagination_resolves_relative_link_and_increments_page() {
        let (def, cfg) = stage(10);
        let item = Item::seed("https://example.com/list?page=1")
            .derive("https://example.com/list?page=1", Content::Text("/list?page=2".into()));
        let out = process(&def, &cfg, item).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].url, "https://example.com/list?page=2");
        assert_eq!(out[0].data.get("pageNum").and_then(serde_json::Value::as_u64), Some(2));
    }

    #[test]
    fn pagination_drops_self_loop() {
        let (def, cfg) = stage(10);
        let item = Item::seed("https://example.com/list")
            .derive("https://example.com/list", Content::Text("https://example.com/list".into()));
        assert_eq!(process(&def, &cfg, item).unwrap().len(), 0);
    }

    #[test]
    fn pagination_halts_at_max_pages() {
        let (def, cfg) = stage(2);
        let mut item = Item::seed("https://example.com/list")
            .derive("https://example.com/list", Content::Text("https://example.com/list?p=3".into()));
        item.set_data("pageNum", 2u64);
        assert_eq!(process(&def, &cfg, item).unwrap().len(), 0);
    }
}
