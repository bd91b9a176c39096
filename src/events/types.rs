//! Event type definitions for the pipeline status/error bus
//!
//! This module contains the core event types published by stage workers and
//! the job executor as items move through a running pipeline.

use serde::{Deserialize, Serialize};

/// Reason a [`PipelineEventBus`](super::bus::PipelineEventBus) is shutting down.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ShutdownReason {
    /// The job completed successfully.
    JobCompleted,
    /// The job encountered a fatal error.
    Error(String),
    /// The job was cancelled or stopped by the caller.
    Cancelled,
}

/// Events emitted during pipeline execution.
///
/// Stage workers publish a pre- and post-processing update for every item;
/// the job executor publishes progress ticks and lifecycle transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PipelineEvent {
    /// A stage worker is about to invoke its processor for an item.
    ItemStarted {
        job_id: String,
        stage_id: String,
        item_id: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
    /// A stage worker finished processing an item.
    ///
    /// `last_error` is only populated when the processor actually returned an
    /// error -- never stringify an absent error.
    ItemFinished {
        job_id: String,
        stage_id: String,
        item_id: String,
        emitted: usize,
        duration: std::time::Duration,
        last_error: Option<String>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
    /// Periodic progress tick published by the job executor's status monitor.
    JobProgress {
        job_id: String,
        completed: u64,
        failed: u64,
        total: u64,
        percent: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
    /// The job transitioned to a terminal state.
    JobFinished {
        job_id: String,
        status: String,
        last_error: Option<String>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
    /// Signals that the bus is shutting down; subscribers should exit their loops.
    Shutdown {
        reason: ShutdownReason,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl PipelineEvent {
    #[must_use]
    pub fn shutdown(reason: ShutdownReason) -> Self {
        Self::Shutdown {
            reason,
            timestamp: chrono::Utc::now(),
        }
    }

    /// The job id this event pertains to, if any (`Shutdown` carries none).
    #[must_use]
    pub fn job_id(&self) -> Option<&str> {
        match self {
            Self::ItemStarted { job_id, .. }
            | Self::ItemFinished { job_id, .. }
            | Self::JobProgress { job_id, .. }
            | Self::JobFinished { job_id, .. } => Some(job_id),
            Self::Shutdown { .. } => None,
        }
    }
}
