//! Pipeline graph node: a typed task, a concurrency level, and the edges it
//! feeds.

pub mod config;
pub mod metrics;

use serde::{Deserialize, Serialize};

pub use config::{OnError, StageConfig};
pub use metrics::StageMetrics;

pub type StageId = String;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum StageType {
    Fetch,
    Extract,
    Filter,
    Transform,
    Follow,
    Pagination,
    Media,
    Store,
    Process,
}

impl StageType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            StageType::Fetch => "fetch",
            StageType::Extract => "extract",
            StageType::Filter => "filter",
            StageType::Transform => "transform",
            StageType::Follow => "follow",
            StageType::Pagination => "pagination",
            StageType::Media => "media",
            StageType::Store => "store",
            StageType::Process => "process",
        }
    }
}

/// A node in the pipeline graph (persisted shape; runtime channels and join
/// handles live alongside it in `pipeline::runtime`, not on this struct).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDef {
    pub id: StageId,
    pub name: String,
    #[serde(rename = "type")]
    pub stage_type: StageType,
    pub config: StageConfig,
    #[serde(default)]
    pub next_stages: Vec<StageId>,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub on_error: OnError,
}

fn default_concurrency() -> usize {
    1
}

impl StageDef {
    /// Check the config variant matches the declared stage type and
    /// `concurrency >= 1`. Called by `Pipeline::new` for every stage.
    pub fn validate(&self) -> Result<(), String> {
        if self.concurrency == 0 {
            return Err(format!("stage {} has concurrency 0", self.id));
        }
        let matches = matches!(
            (self.stage_type, &self.config),
            (StageType::Fetch, StageConfig::Fetch(_))
                | (StageType::Extract, StageConfig::Extract(_))
                | (StageType::Filter, StageConfig::Filter(_))
                | (StageType::Transform, StageConfig::Transform(_))
                | (StageType::Follow, StageConfig::Follow(_))
                | (StageType::Pagination, StageConfig::Pagination(_))
                | (StageType::Media, StageConfig::Media(_))
                | (StageType::Store, StageConfig::Store(_))
                | (StageType::Process, StageConfig::Process)
        );
        if !matches {
            return Err(format!(
                "stage {} declares type {:?} but carries {} config",
                self.id,
                self.stage_type,
                self.config.type_name()
            ));
        }
        Ok(())
    }
}

/// Live per-stage state kept by the pipeline while it runs.
pub struct Stage {
    pub def: StageDef,
    pub metrics: StageMetrics,
}

impl Stage {
    #[must_use]
    pub fn new(def: StageDef) -> Self {
        Self {
            def,
            metrics: StageMetrics::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FetchConfig;

    #[test]
    fn validate_rejects_mismatched_config() {
        let def = StageDef {
            id: "s1".to_string(),
            name: "s1".to_string(),
            stage_type: StageType::Extract,
            config: StageConfig::Fetch(FetchConfig {
                url: None,
                timeout: std::time::Duration::from_secs(30),
                user_agent: None,
                wait_until: None,
            }),
            next_stages: vec![],
            concurrency: 1,
            on_error: OnError::Continue,
        };
        assert!(def.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_concurrency() {
        let def = StageDef {
            id: "s1".to_string(),
            name: "s1".to_string(),
            stage_type: StageType::Process,
            config: StageConfig::Process,
            next_stages: vec![],
            concurrency: 0,
            on_error: OnError::Continue,
        };
        assert!(def.validate().is_err());
    }
}
