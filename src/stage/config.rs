//! Typed per-stage configuration.
//!
//! A tagged enum in place of a dynamic config dictionary: each stage type
//! carries its own struct of strongly-typed fields, validated once at
//! `Pipeline::new` and matched on by the corresponding processor.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// What a stage does when its processor returns an error for an item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "policy", rename_all = "camelCase")]
pub enum OnError {
    Continue,
    Retry { max_retries: u32, backoff_secs: u64 },
    Abort,
}

impl Default for OnError {
    fn default() -> Self {
        Self::Continue
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum WaitUntil {
    Load,
    DomContentLoaded,
    NetworkIdle,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SelectorKind {
    Css,
    XPath,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TransformType {
    Json,
    Trim,
    Replace,
    Extract,
    NormalizeUrl,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchConfig {
    pub url: Option<String>,
    #[serde(with = "humantime_secs", default = "default_fetch_timeout")]
    pub timeout: Duration,
    pub user_agent: Option<String>,
    #[serde(default)]
    pub wait_until: Option<WaitUntil>,
}

fn default_fetch_timeout() -> Duration {
    Duration::from_secs(30)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractConfig {
    pub selector: String,
    #[serde(default = "default_attribute")]
    pub attribute: String,
    #[serde(default = "default_selector_kind")]
    pub kind: SelectorKind,
    #[serde(default)]
    pub is_optional: bool,
}

fn default_attribute() -> String {
    "text".to_string()
}

fn default_selector_kind() -> SelectorKind {
    SelectorKind::Css
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterConfig {
    pub pattern: String,
    #[serde(default = "default_true")]
    pub include_matches: bool,
    #[serde(default = "default_field")]
    pub field: String,
}

fn default_true() -> bool {
    true
}

fn default_field() -> String {
    "content".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformConfig {
    pub transform_type: TransformType,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub replacement: Option<String>,
    #[serde(default = "default_field")]
    pub field: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowConfig {
    pub max_depth: Option<u32>,
    pub include_pattern: Option<String>,
    pub exclude_pattern: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationConfig {
    pub selector: String,
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

fn default_max_pages() -> u32 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaConfig {
    #[serde(default)]
    pub headless: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfig {
    pub path: String,
    pub filename_template: Option<String>,
    #[serde(default)]
    pub thumbnail: bool,
    #[serde(default)]
    pub as_asset: bool,
}

/// Per-stage-type configuration. `Process` is a generic passthrough used by
/// stages that only forward items (e.g. a synthetic loop-back node).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StageConfig {
    Fetch(FetchConfig),
    Extract(ExtractConfig),
    Filter(FilterConfig),
    Transform(TransformConfig),
    Follow(FollowConfig),
    Pagination(PaginationConfig),
    Media(MediaConfig),
    Store(StoreConfig),
    Process,
}

impl StageConfig {
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            StageConfig::Fetch(_) => "fetch",
            StageConfig::Extract(_) => "extract",
            StageConfig::Filter(_) => "filter",
            StageConfig::Transform(_) => "transform",
            StageConfig::Follow(_) => "follow",
            StageConfig::Pagination(_) => "pagination",
            StageConfig::Media(_) => "media",
            StageConfig::Store(_) => "store",
            StageConfig::Process => "process",
        }
    }
}

mod humantime_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}
