//! Media stage: run the strategy engine against `item.url`, emit one item
//! per discovered `MediaSource`.

use std::time::Duration;

use crate::error::ProcessorError;
use crate::item::{Content, Item};
use crate::media::MediaEngine;
use crate::stage::StageDef;
use crate::stage::config::MediaConfig;

use super::ProcessorContext;

pub async fn process(
    ctx: &ProcessorContext,
    stage: &StageDef,
    _cfg: &MediaConfig,
    item: Item,
) -> Result<Vec<Item>, ProcessorError> {
    let tab = ctx.browser_pool.acquire_tab().await.map_err(|e| {
        ProcessorError::new(stage.id.clone(), stage.name.clone(), format!("no browser tab available: {e}"))
            .with_url(item.url.clone())
    })?;

    tab.navigate(&item.url, Duration::from_secs(30)).await.map_err(|e| {
        ProcessorError::new(stage.id.clone(), stage.name.clone(), format!("navigation failed: {e}"))
            .with_url(item.url.clone())
    })?;

    let engine = MediaEngine::new();
    let found = engine.extract(&tab, &item.url).await;

    let out = found
        .into_iter()
        .map(|source| {
            let mut child = item.derive(source.url.clone(), Content::Empty);
            child.set_metadata("sourceURL", item.url.clone());
            child.set_metadata("mediaType", format!("{:?}", source.media_type).to_lowercase());
            child.set_data("confidence", source.confidence as f64);
            child.set_data("method", source.method.clone());
            child
        })
        .collect();

    Ok(out)
}
