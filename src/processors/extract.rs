//! Extract stage: one output item per selector match.
//!
//! XPath is accepted at config parse time but delegates to the CSS engine —
//! a documented limitation, not a silent one.

use scraper::{Html, Selector};

use crate::error::ProcessorError;
use crate::item::{Content, Item};
use crate::stage::StageDef;
use crate::stage::config::ExtractConfig;

pub fn process(stage: &StageDef, cfg: &ExtractConfig, item: Item) -> Result<Vec<Item>, ProcessorError> {
    let html = item.content.as_text().ok_or_else(|| {
        ProcessorError::new(stage.id.clone(), stage.name.clone(), "extract requires text content")
            .with_url(item.url.clone())
    })?;

    let selector = Selector::parse(&cfg.selector).map_err(|e| {
        ProcessorError::new(
            stage.id.clone(),
            stage.name.clone(),
            format!("invalid selector '{}': {e:?}", cfg.selector),
        )
        .with_url(item.url.clone())
    })?;

    let document = Html::parse_document(html);
    let mut out = Vec::new();

    for element in document.select(&selector) {
        let value = if cfg.attribute == "text" {
            element.text().collect::<String>()
        } else {
            element.value().attr(&cfg.attribute).unwrap_or_default().to_string()
        };

        let mut child = item.derive(item.url.clone(), Content::Text(value));
        child.set_metadata("selector", cfg.selector.clone());
        child.set_metadata("attribute", cfg.attribute.clone());
        out.push(child);
    }

    if out.is_empty() && !cfg.is_optional {
        return Err(ProcessorError::new(
            stage.id.clone(),
            stage.name.clone(),
            format!("selector '{}' matched nothing", cfg.selector),
        )
        .with_url(item.url.clone()));
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::StageType;
    use crate::stage::config::{OnError, SelectorKind, StageConfig};

    fn stage(selector: &str, is_optional: bool) -> (StageDef, ExtractConfig) {
        let cfg = ExtractConfig {
            selector: selector.to_string(),
            attribute: "text".to_string(),
            kind: SelectorKind::Css,
            is_optional,
        };
        let def = StageDef {
            id: "extract".to_string(),
            name: "extract".to_string(),
            stage_type: StageType::Extract,
            config: StageConfig::Extract(cfg.clone()),
            next_stages: vec![],
            concurrency: 1,
            on_error: OnError::Continue,
        };
        (def, cfg)
    }

    #[test]
    fn extracts_one_item_per_match() {
        let (def, cfg) = stage("a", false);
        let item = Item::seed("https://example.com")
            .derive("https://example.com", Content::Text("<a>one</a><a>two</a>".into()));
        let out = process(&def, &cfg, item).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].content.as_text(), Some("one"));
    }

    #[test]
    fn required_empty_match_is_error() {
        let (def, cfg) = stage(".missing", false);
        let item = Item::seed("https://example.com")
            .derive("https://example.com", Content::Text("<p>no match</p>".into()));
        assert!(process(&def, &cfg, item).is_err());
    }

    #[test]
    fn optional_empty_match_is_ok() {
        let (def, cfg) = stage(".missing", true);
        let item = Item::seed("https://example.com")
            .derive("https://example.com", Content::Text("<p>no match</p>".into()));
        assert_eq!(process(&def, &cfg, item).unwrap().len(), 0);
    }
}
