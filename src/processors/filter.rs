//! Filter stage: pass or drop an item based on a regex match against a field.

use regex::Regex;

use crate::error::ProcessorError;
use crate::item::Item;
use crate::stage::StageDef;
use crate::stage::config::FilterConfig;

fn field_value<'a>(item: &'a Item, field: &str) -> Option<&'a str> {
    if field == "content" {
        return item.content.as_text();
    }
    item.metadata.get(field).map(String::as_str)
}

pub fn process(stage: &StageDef, cfg: &FilterConfig, item: Item) -> Result<Vec<Item>, ProcessorError> {
    let regex = Regex::new(&cfg.pattern).map_err(|e| {
        ProcessorError::new(
            stage.id.clone(),
            stage.name.clone(),
            format!("invalid filter pattern '{}': {e}", cfg.pattern),
        )
        .with_url(item.url.clone())
    })?;

    let value = field_value(&item, &cfg.field).unwrap_or_default();
    let matched = regex.is_match(value);

    if matched == cfg.include_matches {
        Ok(vec![item])
    } else {
        Ok(vec![])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::Content;
    use crate::stage::StageType;
    use crate::stage::config::{OnError, StageConfig};

    fn stage(pattern: &str, include_matches: bool) -> (StageDef, FilterConfig) {
        let cfg = FilterConfig {
            pattern: pattern.to_string(),
            include_matches,
            field: "content".to_string(),
        };
        let def = StageDef {
            id: "filter".to_string(),
            name: "filter".to_string(),
            stage_type: StageType::Filter,
            config: StageConfig::Filter(cfg.clone()),
            next_stages: vec![],
            concurrency: 1,
            on_error: OnError::Continue,
        };
        (def, cfg)
    }

    #[test]
    fn include_matches_keeps_matching_item() {
        let (def, cfg) = stage("foo", true);
        let item = Item::seed("https://example.com").derive("u", Content::Text("foobar".into()));
        assert_eq!(process(&def, &cfg, item).unwrap().len(), 1);
    }

    #[test]
    fn include_matches_drops_non_matching_item() {
        let (def, cfg) = stage("foo", true);
        let item = Item::seed("https://example.com").derive("u", Content::Text("baz".into()));
        assert_eq!(process(&def, &cfg, item).unwrap().len(), 0);
    }

    #[test]
    fn exclude_mode_drops_matching_item() {
        let (def, cfg) = stage("foo", false);
        let item = Item::seed("https://example.com").derive("u", Content::Text("foobar".into()));
        assert_eq!(process(&def, &cfg, item).unwrap().len(), 0);
    }
}
