//! Read-only input to pipeline construction.

use serde::{Deserialize, Serialize};

use crate::stage::StageDef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectorPurpose {
    Links,
    Assets,
    Video,
    Pagination,
    Metadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorSpec {
    pub selector: String,
    pub purpose: SelectorPurpose,
    #[serde(default)]
    pub attribute: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRules {
    pub max_depth: Option<u32>,
    pub max_assets: Option<u32>,
    pub max_pages: Option<u32>,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    pub include_url_pattern: Option<String>,
    pub exclude_url_pattern: Option<String>,
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
    #[serde(default)]
    pub randomize_delay: bool,
    pub user_agent: Option<String>,
    #[serde(default)]
    pub video_extraction_headless: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Overall wall-clock budget for the whole job, from the first dispatch
    /// to drain. Exceeding it cancels the pipeline the same way an explicit
    /// `stop()` does.
    #[serde(default = "default_job_timeout_secs")]
    pub job_timeout_secs: u64,
}

fn default_max_concurrent() -> usize {
    5
}

fn default_request_delay_ms() -> u64 {
    0
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_job_timeout_secs() -> u64 {
    1800
}

impl Default for JobRules {
    fn default() -> Self {
        Self {
            max_depth: None,
            max_assets: None,
            max_pages: None,
            max_concurrent: default_max_concurrent(),
            include_url_pattern: None,
            exclude_url_pattern: None,
            request_delay_ms: default_request_delay_ms(),
            randomize_delay: false,
            user_agent: None,
            video_extraction_headless: false,
            timeout_secs: default_timeout_secs(),
            job_timeout_secs: default_job_timeout_secs(),
        }
    }
}

/// A serialized pipeline override: `{id, name, description, stages,
/// entryPoints, maxWorkers}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineDescriptor {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub stages: std::collections::HashMap<String, StageDef>,
    pub entry_points: Vec<String>,
    pub max_workers: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDescriptor {
    pub id: String,
    pub base_url: String,
    pub selectors: Vec<SelectorSpec>,
    #[serde(default)]
    pub rules: JobRules,
    pub pipeline: Option<PipelineDescriptor>,
}
