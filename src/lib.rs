pub mod browser_pool;
pub mod browser_profile;
pub mod browser_setup;
pub mod error;
pub mod error_log;
pub mod events;
pub mod external;
pub mod fetcher;
pub mod item;
pub mod job;
pub mod media;
pub mod pipeline;
pub mod processors;
pub mod scheduler;
pub mod stage;
pub mod utils;

pub use browser_pool::{BrowserPool, BrowserPoolConfig};
pub use browser_profile::{
    BrowserProfile, cleanup_stale_profiles, create_unique_profile_with_prefix,
    is_singleton_lock_stale,
};
pub use browser_setup::{apply_stealth_measures, find_browser_executable, launch_browser};
pub use error::{PipelineError, ProcessorError};
pub use events::{PipelineEvent, PipelineEventBus};
pub use external::{
    Asset, InMemoryJobStore, Job, JobStore, MediaKind, NoopThumbnailGenerator, RootedWorkspace,
    Setting, ThumbnailGenerator, WorkspacePaths,
};
pub use fetcher::{Fetcher, FetcherConfig};
pub use item::{Content, Item};
pub use job::descriptor::{JobDescriptor, JobRules, PipelineDescriptor, SelectorPurpose, SelectorSpec};
pub use job::{JobExecutor, JobManager, JobStatus};
pub use media::{MediaEngine, MediaSource, MediaType};
pub use pipeline::Pipeline;
pub use scheduler::Scheduler;
pub use stage::{Stage, StageDef, StageId, StageType};

/// Run a single job end to end: launch a browser pool sized for one job,
/// build the pipeline from `descriptor`, and drive it to completion.
///
/// This is the entry point equivalent to what a CLI or an embedding service
/// calls; callers managing many concurrent jobs should use `JobManager`
/// directly instead so the browser pool and collaborators are shared.
pub async fn run_job(
    descriptor: JobDescriptor,
    job_store: std::sync::Arc<dyn JobStore>,
    workspace: std::sync::Arc<dyn WorkspacePaths>,
    thumbnails: std::sync::Arc<dyn ThumbnailGenerator>,
) -> Result<(), PipelineError> {
    let pool = BrowserPool::new(BrowserPoolConfig::default());
    pool.start()
        .await
        .map_err(|e| PipelineError::ResourceExhausted { message: e.to_string() })?;

    let event_bus = std::sync::Arc::new(PipelineEventBus::new(256));
    let executor = JobExecutor::new(descriptor, job_store, event_bus);
    let result = executor.execute(std::sync::Arc::clone(&pool), workspace, thumbnails).await;
    pool.shutdown().await;
    result
}
