//! Constructs a stage graph from a job descriptor: either the user's
//! serialized pipeline override, or a synthesized default graph.

use std::collections::HashMap;

use crate::error::PipelineError;
use crate::job::descriptor::{JobDescriptor, SelectorPurpose};
use crate::stage::config::{
    ExtractConfig, FetchConfig, FollowConfig, MediaConfig, PaginationConfig, SelectorKind, StoreConfig,
};
use crate::stage::{OnError, Stage, StageConfig, StageDef, StageType};

use super::StageMap;

pub struct BuiltPipeline {
    pub stages: StageMap,
    pub entry_points: Vec<String>,
    pub max_workers: Option<usize>,
}

pub fn build(job: &JobDescriptor) -> Result<BuiltPipeline, PipelineError> {
    if let Some(descriptor) = &job.pipeline {
        return build_from_descriptor(descriptor);
    }
    Ok(build_default(job))
}

fn build_from_descriptor(
    descriptor: &crate::job::descriptor::PipelineDescriptor,
) -> Result<BuiltPipeline, PipelineError> {
    let mut stages = StageMap::new();

    for (id, def) in &descriptor.stages {
        def.validate().map_err(|message| PipelineError::ConfigInvalid { message })?;
        stages.insert(id.clone(), Stage::new(def.clone()));
    }

    for entry in &descriptor.entry_points {
        if !stages.contains_key(entry) {
            return Err(PipelineError::DomainInvariant {
                message: format!("entry point '{entry}' is not a known stage"),
            });
        }
    }

    for stage in stages.values() {
        for next in &stage.def.next_stages {
            if !stages.contains_key(next) {
                return Err(PipelineError::DomainInvariant {
                    message: format!(
                        "stage '{}' references unknown next stage '{next}'",
                        stage.def.id
                    ),
                });
            }
        }
    }

    Ok(BuiltPipeline {
        stages,
        entry_points: descriptor.entry_points.clone(),
        max_workers: descriptor.max_workers,
    })
}

/// Synthesize the default pipeline from the job's selector purposes: a fetch
/// entry point, an extract stage per fetch, and follow/media/store stages
/// fanned out according to which selector purposes are present.
fn build_default(job: &JobDescriptor) -> BuiltPipeline {
    let mut stages = HashMap::new();
    let fetch_id = "fetch".to_string();

    let mut fetch_next = Vec::new();

    let mut counter = 0usize;
    let mut next_id = |prefix: &str| {
        counter += 1;
        format!("{prefix}_{counter}")
    };

    for selector in &job.selectors {
        match selector.purpose {
            SelectorPurpose::Links => {
                let extract_id = next_id("extract_links");
                let follow_id = next_id("follow");

                stages.insert(
                    extract_id.clone(),
                    Stage::new(StageDef {
                        id: extract_id.clone(),
                        name: extract_id.clone(),
                        stage_type: StageType::Extract,
                        config: StageConfig::Extract(ExtractConfig {
                            selector: selector.selector.clone(),
                            attribute: selector.attribute.clone().unwrap_or_else(|| "href".to_string()),
                            kind: SelectorKind::Css,
                            is_optional: true,
                        }),
                        next_stages: vec![follow_id.clone()],
                        concurrency: 2,
                        on_error: OnError::Continue,
                    }),
                );

                stages.insert(
                    follow_id.clone(),
                    Stage::new(StageDef {
                        id: follow_id.clone(),
                        name: follow_id.clone(),
                        stage_type: StageType::Follow,
                        config: StageConfig::Follow(FollowConfig {
                            max_depth: job.rules.max_depth,
                            include_pattern: job.rules.include_url_pattern.clone(),
                            exclude_pattern: job.rules.exclude_url_pattern.clone(),
                        }),
                        next_stages: vec![fetch_id.clone()],
                        concurrency: job.rules.max_concurrent,
                        on_error: OnError::Continue,
                    }),
                );

                fetch_next.push(extract_id);
            }
            SelectorPurpose::Assets => {
                let extract_id = next_id("extract_assets");
                let store_id = next_id("store");

                stages.insert(
                    store_id.clone(),
                    Stage::new(StageDef {
                        id: store_id.clone(),
                        name: store_id.clone(),
                        stage_type: StageType::Store,
                        config: StageConfig::Store(StoreConfig {
                            path: "assets".to_string(),
                            filename_template: None,
                            thumbnail: false,
                            as_asset: true,
                        }),
                        next_stages: vec![],
                        concurrency: 2,
                        on_error: OnError::Continue,
                    }),
                );

                stages.insert(
                    extract_id.clone(),
                    Stage::new(StageDef {
                        id: extract_id.clone(),
                        name: extract_id.clone(),
                        stage_type: StageType::Extract,
                        config: StageConfig::Extract(ExtractConfig {
                            selector: selector.selector.clone(),
                            attribute: selector.attribute.clone().unwrap_or_else(|| "src".to_string()),
                            kind: SelectorKind::Css,
                            is_optional: true,
                        }),
                        next_stages: vec![store_id],
                        concurrency: 2,
                        on_error: OnError::Continue,
                    }),
                );

                fetch_next.push(extract_id);
            }
            SelectorPurpose::Video => {
                let extract_id = next_id("extract_video");
                let media_id = next_id("media");
                let store_id = next_id("store_video");

                stages.insert(
                    store_id.clone(),
                    Stage::new(StageDef {
                        id: store_id.clone(),
                        name: store_id.clone(),
                        stage_type: StageType::Store,
                        config: StageConfig::Store(StoreConfig {
                            path: "video".to_string(),
                            filename_template: None,
                            thumbnail: true,
                            as_asset: true,
                        }),
                        next_stages: vec![],
                        concurrency: 2,
                        on_error: OnError::Continue,
                    }),
                );

                stages.insert(
                    media_id.clone(),
                    Stage::new(StageDef {
                        id: media_id.clone(),
                        name: media_id.clone(),
                        stage_type: StageType::Media,
                        config: StageConfig::Media(MediaConfig {
                            headless: job.rules.video_extraction_headless,
                        }),
                        next_stages: vec![store_id],
                        concurrency: 1,
                        on_error: OnError::Continue,
                    }),
                );

                stages.insert(
                    extract_id.clone(),
                    Stage::new(StageDef {
                        id: extract_id.clone(),
                        name: extract_id.clone(),
                        stage_type: StageType::Extract,
                        config: StageConfig::Extract(ExtractConfig {
                            selector: selector.selector.clone(),
                            attribute: selector.attribute.clone().unwrap_or_else(|| "href".to_string()),
                            kind: SelectorKind::Css,
                            is_optional: true,
                        }),
                        next_stages: vec![media_id],
                        concurrency: 2,
                        on_error: OnError::Continue,
                    }),
                );

                fetch_next.push(extract_id);
            }
            SelectorPurpose::Pagination => {
                let pagination_id = next_id("pagination");

                stages.insert(
                    pagination_id.clone(),
                    Stage::new(StageDef {
                        id: pagination_id.clone(),
                        name: pagination_id.clone(),
                        stage_type: StageType::Pagination,
                        config: StageConfig::Pagination(PaginationConfig {
                            selector: selector.selector.clone(),
                            max_pages: job.rules.max_pages.unwrap_or(10),
                        }),
                        next_stages: vec![fetch_id.clone()],
                        concurrency: 1,
                        on_error: OnError::Continue,
                    }),
                );

                fetch_next.push(pagination_id);
            }
            SelectorPurpose::Metadata => {
                // Metadata selectors attach to the fetched page but emit no
                // further crawl edges of their own.
                let extract_id = next_id("extract_metadata");
                stages.insert(
                    extract_id.clone(),
                    Stage::new(StageDef {
                        id: extract_id.clone(),
                        name: extract_id.clone(),
                        stage_type: StageType::Extract,
                        config: StageConfig::Extract(ExtractConfig {
                            selector: selector.selector.clone(),
                            attribute: selector.attribute.clone().unwrap_or_else(|| "text".to_string()),
                            kind: SelectorKind::Css,
                            is_optional: true,
                        }),
                        next_stages: vec![],
                        concurrency: 1,
                        on_error: OnError::Continue,
                    }),
                );
                fetch_next.push(extract_id);
            }
        }
    }

    stages.insert(
        fetch_id.clone(),
        Stage::new(StageDef {
            id: fetch_id.clone(),
            name: "fetch".to_string(),
            stage_type: StageType::Fetch,
            config: StageConfig::Fetch(FetchConfig {
                url: None,
                timeout: std::time::Duration::from_secs(job.rules.timeout_secs),
                user_agent: job.rules.user_agent.clone(),
                wait_until: None,
            }),
            next_stages: fetch_next,
            concurrency: 1,
            on_error: OnError::Continue,
        }),
    );

    BuiltPipeline {
        stages,
        entry_points: vec![fetch_id],
        max_workers: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::descriptor::{JobDescriptor, JobRules, SelectorSpec};

    fn job(selectors: Vec<SelectorSpec>) -> JobDescriptor {
        JobDescriptor {
            id: "job".to_string(),
            base_url: "https://example.com".to_string(),
            selectors,
            rules: JobRules::default(),
            pipeline: None,
        }
    }

    #[test]
    fn default_graph_has_a_single_fetch_entry_point() {
        let built = build(&job(vec![])).unwrap();
        assert_eq!(built.entry_points, vec!["fetch".to_string()]);
        assert_eq!(built.stages.len(), 1);
    }

    #[test]
    fn links_selector_creates_an_extract_follow_loop_back_to_fetch() {
        let built = build(&job(vec![SelectorSpec {
            selector: "a.next".to_string(),
            purpose: SelectorPurpose::Links,
            attribute: None,
        }]))
        .unwrap();

        assert_eq!(built.stages.len(), 3);
        let fetch = built.stages.get("fetch").unwrap();
        assert_eq!(fetch.def.next_stages.len(), 1);

        let extract_id = &fetch.def.next_stages[0];
        let extract = built.stages.get(extract_id).unwrap();
        let follow_id = &extract.def.next_stages[0];
        let follow = built.stages.get(follow_id).unwrap();
        assert_eq!(follow.def.next_stages, vec!["fetch".to_string()]);
    }

    #[test]
    fn metadata_selector_is_terminal() {
        let built = build(&job(vec![SelectorSpec {
            selector: "title".to_string(),
            purpose: SelectorPurpose::Metadata,
            attribute: None,
        }]))
        .unwrap();

        let fetch = built.stages.get("fetch").unwrap();
        let extract_id = &fetch.def.next_stages[0];
        let extract = built.stages.get(extract_id).unwrap();
        assert!(extract.def.next_stages.is_empty());
    }

    #[test]
    fn unknown_entry_point_in_override_is_rejected() {
        use crate::job::descriptor::PipelineDescriptor;

        let mut descriptor = job(vec![]);
        descriptor.pipeline = Some(PipelineDescriptor {
            id: "custom".to_string(),
            name: "custom".to_string(),
            description: None,
            stages: HashMap::new(),
            entry_points: vec!["missing".to_string()],
            max_workers: None,
        });

        assert!(build(&descriptor).is_err());
    }
}
