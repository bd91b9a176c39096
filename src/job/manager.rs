//! Process-wide registry of running jobs: starts executors,
//! answers status queries, and can stop everything on shutdown.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

use crate::browser_pool::BrowserPool;
use crate::error::PipelineError;
use crate::events::PipelineEventBus;
use crate::external::{JobStore, ThumbnailGenerator, WorkspacePaths};
use crate::job::descriptor::JobDescriptor;
use crate::job::executor::{JobExecutor, JobStatus};

/// Owns the browser pool and collaborator handles shared by every job this
/// process runs, plus the table of in-flight executors.
pub struct JobManager {
    browser_pool: Arc<BrowserPool>,
    job_store: Arc<dyn JobStore>,
    workspace: Arc<dyn WorkspacePaths>,
    thumbnails: Arc<dyn ThumbnailGenerator>,
    event_bus: Arc<PipelineEventBus>,
    jobs: DashMap<String, Arc<JobExecutor>>,
}

impl JobManager {
    #[must_use]
    pub fn new(
        browser_pool: Arc<BrowserPool>,
        job_store: Arc<dyn JobStore>,
        workspace: Arc<dyn WorkspacePaths>,
        thumbnails: Arc<dyn ThumbnailGenerator>,
        event_bus: Arc<PipelineEventBus>,
    ) -> Arc<Self> {
        Arc::new(Self {
            browser_pool,
            job_store,
            workspace,
            thumbnails,
            event_bus,
            jobs: DashMap::new(),
        })
    }

    /// Register a job and spawn its execution in the background, returning
    /// immediately. The executor is reachable by id via `get_status`.
    pub fn start_job(self: &Arc<Self>, descriptor: JobDescriptor) -> Arc<JobExecutor> {
        let job_id = descriptor.id.clone();
        let executor = JobExecutor::new(descriptor, Arc::clone(&self.job_store), Arc::clone(&self.event_bus));
        self.jobs.insert(job_id.clone(), Arc::clone(&executor));

        let manager = Arc::clone(self);
        let executor_bg = Arc::clone(&executor);
        tokio::spawn(async move {
            let result = executor_bg
                .execute(
                    Arc::clone(&manager.browser_pool),
                    Arc::clone(&manager.workspace),
                    Arc::clone(&manager.thumbnails),
                )
                .await;
            if let Err(e) = result {
                info!(job_id = %job_id, error = %e, "job executor returned an error");
            }
        });

        executor
    }

    #[must_use]
    pub fn get_status(&self, job_id: &str) -> Option<JobStatus> {
        self.jobs.get(job_id).map(|e| e.status())
    }

    #[must_use]
    pub fn get_executor(&self, job_id: &str) -> Option<Arc<JobExecutor>> {
        self.jobs.get(job_id).map(|e| Arc::clone(e.value()))
    }

    #[must_use]
    pub fn all_statuses(&self) -> Vec<(String, JobStatus)> {
        self.jobs.iter().map(|e| (e.key().clone(), e.value().status())).collect()
    }

    /// Stop every running job and wait for their executors to acknowledge.
    pub async fn stop_all(&self) -> Result<(), PipelineError> {
        let executors: Vec<Arc<JobExecutor>> = self.jobs.iter().map(|e| Arc::clone(e.value())).collect();
        for executor in executors {
            executor.stop().await;
        }
        Ok(())
    }

    pub async fn stop_job(&self, job_id: &str) -> bool {
        if let Some(executor) = self.get_executor(job_id) {
            executor.stop().await;
            true
        } else {
            false
        }
    }
}
