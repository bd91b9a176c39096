//! Task processors: one pure-ish async function per stage type, each
//! `(&Stage, Item) -> Result<Vec<Item>, ProcessorError>`.

pub mod extract;
pub mod fetch;
pub mod filter;
pub mod follow;
pub mod media;
pub mod pagination;
pub mod store;
pub mod transform;

use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use tokio::sync::Semaphore;

use crate::browser_pool::BrowserPool;
use crate::error::ProcessorError;
use crate::external::{JobStore, ThumbnailGenerator, WorkspacePaths};
use crate::fetcher::Fetcher;
use crate::item::Item;
use crate::job::executor::UrlTracker;
use crate::stage::{Stage, StageConfig};

/// Shared, cloneable handles every processor may need. Constructed once per
/// pipeline and passed down to every stage worker.
#[derive(Clone)]
pub struct ProcessorContext {
    pub browser_pool: Arc<BrowserPool>,
    pub fetcher: Fetcher,
    pub job_store: Arc<dyn JobStore>,
    pub workspace: Arc<dyn WorkspacePaths>,
    pub thumbnails: Arc<dyn ThumbnailGenerator>,
    pub job_id: String,
    /// Job-wide seen-URL set; lets the fetch stage skip a URL already
    /// fetched by this job, whether or not this is the URL's first visit
    /// through this particular pipeline stage.
    pub url_tracker: Arc<UrlTracker>,
    /// Bounds concurrent asset persistence to `job.rules.max_concurrent`,
    /// independent of each stage's own worker concurrency.
    pub asset_permits: Arc<Semaphore>,
    /// Running count of assets persisted so far this job, checked against
    /// `job.rules.max_assets` by the store stage.
    pub asset_count: Arc<AtomicU64>,
    pub max_assets: Option<u32>,
}

/// Dispatch `item` to the processor matching `stage`'s declared type.
pub async fn process(
    ctx: &ProcessorContext,
    stage: &Stage,
    item: Item,
) -> Result<Vec<Item>, ProcessorError> {
    match &stage.def.config {
        StageConfig::Fetch(cfg) => fetch::process(ctx, &stage.def, cfg, item).await,
        StageConfig::Extract(cfg) => extract::process(&stage.def, cfg, item),
        StageConfig::Filter(cfg) => filter::process(&stage.def, cfg, item),
        StageConfig::Transform(cfg) => transform::process(&stage.def, cfg, item),
        StageConfig::Follow(cfg) => follow::process(&stage.def, cfg, item),
        StageConfig::Pagination(cfg) => pagination::process(&stage.def, cfg, item),
        StageConfig::Media(cfg) => media::process(ctx, &stage.def, cfg, item).await,
        StageConfig::Store(cfg) => store::process(ctx, &stage.def, cfg, item).await,
        StageConfig::Process => Ok(vec![item]),
    }
}
