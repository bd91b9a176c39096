//! Crate-level error sum type
//!
//! Every fallible operation in the pipeline runtime, task processors, and job
//! executor ultimately reports one of these kinds so the status/error log sink
//! can match on them uniformly.

use thiserror::Error;

/// Structured failure produced by a stage, a task processor, or pipeline
/// construction/execution.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("transient I/O error{}: {message}", url.as_deref().map(|u| format!(" fetching {u}")).unwrap_or_default())]
    TransientIo {
        url: Option<String>,
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    #[error("failed to parse {context}: {message}")]
    ParseFailure { context: String, message: String },

    #[error("resource exhausted: {message}")]
    ResourceExhausted { message: String },

    #[error("canceled")]
    Canceled,

    #[error("invalid pipeline configuration: {message}")]
    ConfigInvalid { message: String },

    #[error("domain invariant violated: {message}")]
    DomainInvariant { message: String },
}

impl PipelineError {
    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self::TransientIo {
            url: None,
            message: message.into(),
            source: None,
        }
    }

    #[must_use]
    pub fn transient_for_url(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TransientIo {
            url: Some(url.into()),
            message: message.into(),
            source: None,
        }
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientIo { .. } | Self::ResourceExhausted { .. })
    }
}

/// Error returned by a task processor, carrying enough context for the stage
/// worker's structured error log.
#[derive(Debug, Error)]
#[error("processor error in stage {stage_name} ({stage_id}): {message}")]
pub struct ProcessorError {
    pub url: Option<String>,
    pub stage: String,
    pub stage_id: String,
    pub stage_name: String,
    pub message: String,
    #[source]
    pub source: Option<anyhow::Error>,
    pub html: Option<String>,
    pub screenshot: Option<Vec<u8>>,
    pub network_log: Vec<crate::browser_pool::NetworkLogEntry>,
}

impl ProcessorError {
    #[must_use]
    pub fn new(stage_id: impl Into<String>, stage_name: impl Into<String>, message: impl Into<String>) -> Self {
        let stage_name = stage_name.into();
        Self {
            url: None,
            stage: stage_name.clone(),
            stage_id: stage_id.into(),
            stage_name,
            message: message.into(),
            source: None,
            html: None,
            screenshot: None,
            network_log: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

impl From<ProcessorError> for PipelineError {
    fn from(e: ProcessorError) -> Self {
        PipelineError::TransientIo {
            url: e.url.clone(),
            message: e.message.clone(),
            source: Some(anyhow::anyhow!(e)),
        }
    }
}
