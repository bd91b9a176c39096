//! Follow stage: turn extracted link text into a deeper fetch seed.

use regex::Regex;

use crate::error::ProcessorError;
use crate::item::{Content, Item};
use crate::stage::StageDef;
use crate::stage::config::FollowConfig;
use crate::utils::is_valid_url;

pub fn process(stage: &StageDef, cfg: &FollowConfig, item: Item) -> Result<Vec<Item>, ProcessorError> {
    let url = item
        .content
        .as_text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            ProcessorError::new(stage.id.clone(), stage.name.clone(), "follow requires non-empty text content")
                .with_url(item.url.clone())
        })?;

    if !is_valid_url(url) {
        return Ok(vec![]);
    }

    if let Some(max_depth) = cfg.max_depth
        && item.depth + 1 >= max_depth
    {
        return Ok(vec![]);
    }

    if let Some(pattern) = &cfg.include_pattern {
        let regex = compile(stage, pattern, &item)?;
        if !regex.is_match(url) {
            return Ok(vec![]);
        }
    }

    if let Some(pattern) = &cfg.exclude_pattern {
        let regex = compile(stage, pattern, &item)?;
        if regex.is_match(url) {
            return Ok(vec![]);
        }
    }

    let mut next = item.derive(url, Content::Empty);
    next.depth = item.depth + 1;
    Ok(vec![next])
}

fn compile(stage: &StageDef, pattern: &str, item: &Item) -> Result<Regex, ProcessorError> {
    Regex::new(pattern).map_err(|e| {
        ProcessorError::new(
            stage.id.clone(),
            stage.name.clone(),
            format!("invalid pattern '{pattern}': {e}"),
        )
        .with_url(item.url.clone())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::StageType;
    use crate::stage::config::{OnError, StageConfig};

    fn stage(cfg: FollowConfig) -> StageDef {
        StageDef {
            id: "follow".to_string(),
            name: "follow".to_string(),
            stage_type: StageType::Follow,
            config: StageConfig::Follow(cfg),
            next_stages: vec![],
            concurrency: 1,
            on_error: OnError::Continue,
        }
    }

    #[test]
    fn follow_bumps_depth() {
        let cfg = FollowConfig { max_depth: None, include_pattern: None, exclude_pattern: None };
        let def = stage(cfg.clone());
        let item = Item::seed("https://example.com").derive("https://example.com/next", Content::Text("https://example.com/next".into()));
        let out = process(&def, &cfg, item.clone()).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].depth, item.depth + 1);
    }

    #[test]
    fn follow_stops_at_max_depth() {
        let cfg = FollowConfig { max_depth: Some(1), include_pattern: None, exclude_pattern: None };
        let def = stage(cfg.clone());
        let mut item = Item::seed("https://example.com");
        item.depth = 0;
        let item = item.derive("https://example.com/next", Content::Text("https://example.com/next".into()));
        assert_eq!(process(&def, &cfg, item).unwrap().len(), 0);
    }

    #[test]
    fn follow_drops_non_http_scheme() {
        let cfg = FollowConfig { max_depth: None, include_pattern: None, exclude_pattern: None };
        let def = stage(cfg.clone());
        let item = Item::seed("https://example.com")
            .derive("https://example.com", Content::Text("javascript:void(0)".into()));
        assert_eq!(process(&def, &cfg, item).unwrap().len(), 0);
    }

    #[test]
    fn follow_respects_exclude_pattern() {
        let cfg = FollowConfig {
            max_depth: None,
            include_pattern: None,
            exclude_pattern: Some("logout".to_string()),
        };
        let def = stage(cfg.clone());
        let item = Item::seed("https://example.com").derive(
            "https://example.com/logout",
            Content::Text("https://example.com/logout".into()),
        );
        assert_eq!(process(&def, &cfg, item).unwrap().len(), 0);
    }
}
