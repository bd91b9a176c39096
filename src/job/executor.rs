//! Runs one job's pipeline to completion, owning the collaborators it needs
//! (browser pool, job store, workspace, thumbnails) and publishing lifecycle
//! events.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{error, info};

use crate::browser_pool::BrowserPool;
use crate::error::PipelineError;
use crate::events::{PipelineEvent, PipelineEventBus};
use crate::external::{Job, JobStore, ThumbnailGenerator, WorkspacePaths};
use crate::fetcher::Fetcher;
use crate::job::descriptor::JobDescriptor;
use crate::pipeline::Pipeline;
use crate::processors::ProcessorContext;

const STATUS_TICK: Duration = Duration::from_secs(5);

/// Job-wide "have we already touched this URL" record, shared between the
/// executor and the fetch processor via `ProcessorContext`. Entry-or-insert
/// semantics: the first call for a given URL bumps the matching counter, a
/// repeat is a no-op dedup hit.
pub struct UrlTracker {
    seen: DashMap<String, bool>,
    processed: AtomicU64,
    failed: AtomicU64,
}

impl UrlTracker {
    #[must_use]
    pub fn new() -> Self {
        Self { seen: DashMap::new(), processed: AtomicU64::new(0), failed: AtomicU64::new(0) }
    }

    #[must_use]
    pub fn should_process_url(&self, url: &str) -> bool {
        !self.seen.contains_key(url)
    }

    pub fn mark_url_processed(&self, url: &str, success: bool) {
        use dashmap::mapref::entry::Entry;
        if let Entry::Vacant(slot) = self.seen.entry(url.to_string()) {
            slot.insert(success);
            if success {
                self.processed.fetch_add(1, Ordering::Relaxed);
            } else {
                self.failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    #[must_use]
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Stopped,
}

impl JobStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Stopped => "stopped",
        }
    }
}

/// Owns one job's pipeline and collaborator handles; `JobManager` keeps a
/// `DashMap` of these keyed by job id.
pub struct JobExecutor {
    descriptor: JobDescriptor,
    job_store: Arc<dyn JobStore>,
    event_bus: Arc<PipelineEventBus>,
    status: Mutex<JobStatus>,
    url_tracker: Arc<UrlTracker>,
    asset_permits: Arc<Semaphore>,
    asset_count: Arc<AtomicU64>,
    pipeline: Mutex<Option<Arc<Pipeline>>>,
}

impl JobExecutor {
    #[must_use]
    pub fn new(
        descriptor: JobDescriptor,
        job_store: Arc<dyn JobStore>,
        event_bus: Arc<PipelineEventBus>,
    ) -> Arc<Self> {
        let asset_permits = Arc::new(Semaphore::new(descriptor.rules.max_concurrent));
        Arc::new(Self {
            descriptor,
            job_store,
            event_bus,
            status: Mutex::new(JobStatus::Pending),
            url_tracker: Arc::new(UrlTracker::new()),
            asset_permits,
            asset_count: Arc::new(AtomicU64::new(0)),
            pipeline: Mutex::new(None),
        })
    }

    #[must_use]
    pub fn job_id(&self) -> &str {
        &self.descriptor.id
    }

    #[must_use]
    pub fn status(&self) -> JobStatus {
        *self.status.lock()
    }

    #[must_use]
    pub fn processed_urls(&self) -> u64 {
        self.url_tracker.processed()
    }

    #[must_use]
    pub fn failed_urls(&self) -> u64 {
        self.url_tracker.failed()
    }

    /// Build a pipeline from this job's descriptor and run it to completion.
    /// The caller is expected to have already launched `browser_pool`.
    pub async fn execute(
        self: &Arc<Self>,
        browser_pool: Arc<BrowserPool>,
        workspace: Arc<dyn WorkspacePaths>,
        thumbnails: Arc<dyn ThumbnailGenerator>,
    ) -> Result<(), PipelineError> {
        *self.status.lock() = JobStatus::Running;

        let fetcher = match Fetcher::new(&crate::fetcher::FetcherConfig::default()) {
            Ok(f) => f,
            Err(e) => {
                self.finish(JobStatus::Failed, Some(e.to_string())).await;
                return Err(e);
            }
        };

        let ctx = ProcessorContext {
            browser_pool,
            fetcher,
            job_store: Arc::clone(&self.job_store),
            workspace,
            thumbnails,
            job_id: self.descriptor.id.clone(),
            url_tracker: Arc::clone(&self.url_tracker),
            asset_permits: Arc::clone(&self.asset_permits),
            asset_count: Arc::clone(&self.asset_count),
            max_assets: self.descriptor.rules.max_assets,
        };

        let pipeline = match Pipeline::new(&self.descriptor, ctx, Arc::clone(&self.event_bus)) {
            Ok(p) => Arc::new(p),
            Err(e) => {
                self.finish(JobStatus::Failed, Some(e.to_string())).await;
                return Err(e);
            }
        };

        *self.pipeline.lock() = Some(Arc::clone(&pipeline));

        let monitor = tokio::spawn(Arc::clone(self).run_status_monitor());

        let result = pipeline.execute(self.descriptor.base_url.clone()).await;
        monitor.abort();

        self.asset_permits.close();

        match &result {
            Ok(()) => self.finish(JobStatus::Completed, None).await,
            Err(PipelineError::Canceled) => self.finish(JobStatus::Stopped, None).await,
            Err(e) => self.finish(JobStatus::Failed, Some(e.to_string())).await,
        }

        result
    }

    /// Periodically persist progress while the pipeline runs, ticking every
    /// [`STATUS_TICK`]. Stopped by aborting the handle once `execute` returns.
    async fn run_status_monitor(self: Arc<Self>) {
        let mut interval = tokio::time::interval(STATUS_TICK);
        interval.tick().await;
        loop {
            interval.tick().await;
            let processed = self.processed_urls();
            let failed = self.failed_urls();
            let total = self
                .descriptor
                .rules
                .max_pages
                .map(u64::from)
                .unwrap_or(processed + failed)
                .max(1);
            let progress = ((processed + failed) as f64 / total as f64 * 100.0).min(100.0);

            let _ = self
                .event_bus
                .publish(PipelineEvent::JobProgress {
                    job_id: self.descriptor.id.clone(),
                    completed: processed,
                    failed,
                    total,
                    percent: progress,
                    timestamp: Utc::now(),
                })
                .await;

            let job = Job {
                id: self.descriptor.id.clone(),
                name: self.descriptor.id.clone(),
                descriptor: serde_json::to_value(&self.descriptor).unwrap_or(serde_json::Value::Null),
                schedule: None,
                status: self.status().as_str().to_string(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
                processed_urls: processed,
                failed_urls: failed,
                total_urls: processed + failed,
            };

            if let Err(e) = self.job_store.update_job(&job).await {
                error!(job_id = %self.descriptor.id, error = %e, "failed to persist progress");
            }
            tracing::debug!(job_id = %self.descriptor.id, progress, "status tick");
        }
    }

    /// Request cancellation of the running pipeline, if any.
    pub async fn stop(&self) {
        let pipeline = self.pipeline.lock().clone();
        if let Some(pipeline) = pipeline {
            pipeline.shutdown().await;
        }
        self.asset_permits.close();
        *self.status.lock() = JobStatus::Stopped;
    }

    async fn finish(&self, status: JobStatus, error: Option<String>) {
        *self.status.lock() = status;

        match status {
            JobStatus::Failed => {
                error!(job_id = %self.descriptor.id, error = error.as_deref().unwrap_or(""), "job failed");
            }
            JobStatus::Completed => info!(job_id = %self.descriptor.id, "job completed"),
            _ => {}
        }

        let job = Job {
            id: self.descriptor.id.clone(),
            name: self.descriptor.id.clone(),
            descriptor: serde_json::to_value(&self.descriptor).unwrap_or(serde_json::Value::Null),
            schedule: None,
            status: status.as_str().to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            processed_urls: self.processed_urls(),
            failed_urls: self.failed_urls(),
            total_urls: self.processed_urls() + self.failed_urls(),
        };

        if let Err(e) = self.job_store.update_job(&job).await {
            error!(job_id = %self.descriptor.id, error = %e, "failed to persist job record");
        }

        let _ = self
            .event_bus
            .publish(PipelineEvent::JobFinished {
                job_id: self.descriptor.id.clone(),
                status: status.as_str().to_string(),
                last_error: error,
                timestamp: Utc::now(),
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_mark_for_the_same_url_is_a_no_op() {
        let tracker = UrlTracker::new();
        assert!(tracker.should_process_url("https://example.com"));

        tracker.mark_url_processed("https://example.com", true);
        assert_eq!(tracker.processed(), 1);
        assert!(!tracker.should_process_url("https://example.com"));

        tracker.mark_url_processed("https://example.com", false);
        assert_eq!(tracker.processed(), 1);
        assert_eq!(tracker.failed(), 0);
    }

    #[test]
    fn failed_mark_bumps_the_failed_counter() {
        let tracker = UrlTracker::new();
        tracker.mark_url_processed("https://example.com/dead", false);
        assert_eq!(tracker.failed(), 1);
        assert_eq!(tracker.processed(), 0);
    }
}
