//! Wires a built stage graph into live channels and worker tasks, tracks
//! in-flight items to detect completion, and drives shutdown/cancellation.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use tokio::sync::{Mutex as AsyncMutex, Notify, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::PipelineError;
use crate::events::{PipelineEvent, PipelineEventBus, ShutdownReason};
use crate::item::Item;
use crate::processors::ProcessorContext;
use crate::stage::StageId;

use super::builder::{self, BuiltPipeline};
use super::worker::run_worker;
use super::{ProcessedSet, StageMap};
use crate::job::descriptor::JobDescriptor;

/// Channel depth for every stage-to-stage edge. Bounded rather than
/// unbounded, so a slow downstream stage applies backpressure to its
/// upstream producers.
const CHANNEL_BUFFER: usize = 100;

/// A constructed, runnable pipeline for one job.
pub struct Pipeline {
    pub job_id: String,
    pub(super) stages: Arc<StageMap>,
    entry_points: Vec<StageId>,
    senders: HashMap<StageId, mpsc::Sender<Item>>,
    receivers: AsyncMutex<Option<HashMap<StageId, mpsc::Receiver<Item>>>>,
    processed: Arc<ProcessedSet>,
    in_flight: Arc<AtomicI64>,
    idle: Arc<Notify>,
    cancellation: CancellationToken,
    deadline: std::time::Duration,
    event_bus: Arc<PipelineEventBus>,
    ctx: ProcessorContext,
    workers: AsyncMutex<JoinSet<()>>,
}

impl Pipeline {
    /// Construct a pipeline from a job descriptor, synthesizing the default
    /// graph or validating a supplied override.
    pub fn new(
        job: &JobDescriptor,
        ctx: ProcessorContext,
        event_bus: Arc<PipelineEventBus>,
    ) -> Result<Self, PipelineError> {
        let BuiltPipeline {
            stages,
            entry_points,
            max_workers: _,
        } = builder::build(job)?;

        for stage in stages.values() {
            stage
                .def
                .validate()
                .map_err(|message| PipelineError::ConfigInvalid { message })?;
        }

        if entry_points.is_empty() {
            return Err(PipelineError::DomainInvariant {
                message: "pipeline has no entry points".to_string(),
            });
        }

        let mut senders = HashMap::new();
        let mut receivers = HashMap::new();
        for id in stages.keys() {
            let (tx, rx) = mpsc::channel(CHANNEL_BUFFER);
            senders.insert(id.clone(), tx);
            receivers.insert(id.clone(), rx);
        }

        Ok(Self {
            job_id: job.id.clone(),
            stages: Arc::new(stages),
            entry_points,
            senders,
            receivers: AsyncMutex::new(Some(receivers)),
            processed: Arc::new(ProcessedSet::default()),
            in_flight: Arc::new(AtomicI64::new(0)),
            idle: Arc::new(Notify::new()),
            cancellation: CancellationToken::new(),
            deadline: std::time::Duration::from_secs(job.rules.job_timeout_secs),
            event_bus,
            ctx,
            workers: AsyncMutex::new(JoinSet::new()),
        })
    }

    /// Spawn `concurrency` workers per stage, seed the entry points with
    /// `seed_url`, then wait until no item is in flight anywhere in the
    /// graph. Returns once the crawl has drained, or early on cancellation.
    pub async fn execute(self: &Arc<Self>, seed_url: impl Into<String>) -> Result<(), PipelineError> {
        let mut receivers = self
            .receivers
            .lock()
            .await
            .take()
            .ok_or_else(|| PipelineError::DomainInvariant {
                message: "pipeline already executed".to_string(),
            })?;

        let mut workers = self.workers.lock().await;
        for (stage_id, stage) in self.stages.iter() {
            let rx = receivers
                .remove(stage_id)
                .expect("every stage has a receiver");
            let rx = Arc::new(AsyncMutex::new(rx));

            for _ in 0..stage.def.concurrency {
                let pipeline = Arc::clone(self);
                let rx = Arc::clone(&rx);
                let stage_id = stage_id.clone();
                workers.spawn(async move {
                    run_worker(pipeline, stage_id, rx).await;
                });
            }
        }
        drop(workers);

        let seed = Item::seed(seed_url.into());
        for entry in &self.entry_points {
            self.dispatch(entry, seed.clone()).await;
        }

        tokio::select! {
            () = self.idle.notified() => {
                info!(job_id = %self.job_id, "pipeline drained");
            }
            () = self.cancellation.cancelled() => {
                warn!(job_id = %self.job_id, "pipeline canceled before draining");
                return Err(PipelineError::Canceled);
            }
            () = tokio::time::sleep(self.deadline) => {
                warn!(job_id = %self.job_id, deadline_secs = self.deadline.as_secs(), "pipeline exceeded its deadline, canceling");
                self.cancel_for_abort();
                return Err(PipelineError::Canceled);
            }
        }

        Ok(())
    }

    /// Send `item` to `stage_id`'s inbound channel, bumping the in-flight
    /// counter first so completion can never be observed prematurely.
    pub(super) async fn dispatch(&self, stage_id: &str, item: Item) {
        let Some(sender) = self.senders.get(stage_id) else {
            error!(stage_id, "dispatch to unknown stage, dropping item");
            return;
        };
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        if sender.send(item).await.is_err() {
            // Receiver already torn down (shutdown raced the send).
            self.note_completed();
        }
    }

    /// Mark one item as fully handled by its current stage (whether it
    /// produced zero, one, or many downstream items -- each of those was
    /// already counted by its own `dispatch` call).
    pub(super) fn note_completed(&self) {
        if self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }

    pub(super) fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Stop the whole pipeline immediately because a stage configured with
    /// `OnError::Abort` failed.
    pub(super) fn cancel_for_abort(&self) {
        self.cancellation.cancel();
        self.idle.notify_waiters();
    }

    pub(super) fn processed(&self) -> &ProcessedSet {
        &self.processed
    }

    pub(super) fn event_bus(&self) -> &PipelineEventBus {
        &self.event_bus
    }

    pub(super) fn ctx(&self) -> &ProcessorContext {
        &self.ctx
    }

    /// Cancel all workers and wait for them to exit.
    pub async fn shutdown(self: Arc<Self>) {
        self.cancellation.cancel();
        self.idle.notify_waiters();
        self.event_bus
            .shutdown_gracefully(ShutdownReason::Cancelled)
            .await;

        let mut workers = self.workers.lock().await;
        while workers.join_next().await.is_some() {}
    }

    /// Publish a job-level lifecycle event, swallowing "no subscribers"
    /// since nothing guarantees a listener is attached.
    pub(super) async fn publish(&self, event: PipelineEvent) {
        let _ = self.event_bus.publish(event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::{InMemoryJobStore, NoopThumbnailGenerator, RootedWorkspace};
    use crate::fetcher::{Fetcher, FetcherConfig};
    use crate::job::descriptor::{JobDescriptor, JobRules, SelectorPurpose, SelectorSpec};

    fn ctx() -> ProcessorContext {
        let dir = tempfile::tempdir().unwrap();
        ProcessorContext {
            browser_pool: crate::browser_pool::BrowserPool::new(crate::browser_pool::BrowserPoolConfig::default()),
            fetcher: Fetcher::new(&FetcherConfig::default()).unwrap(),
            job_store: InMemoryJobStore::new(),
            workspace: Arc::new(RootedWorkspace::new(dir.path())),
            thumbnails: Arc::new(NoopThumbnailGenerator),
            job_id: "job".to_string(),
            url_tracker: Arc::new(crate::job::executor::UrlTracker::new()),
            asset_permits: Arc::new(tokio::sync::Semaphore::new(5)),
            asset_count: Arc::new(std::sync::atomic::AtomicU64::new(0)),
            max_assets: None,
        }
    }

    #[test]
    fn deadline_defaults_to_the_job_rules_timeout() {
        let job = JobDescriptor {
            id: "job".to_string(),
            base_url: "https://example.com".to_string(),
            selectors: vec![SelectorSpec {
                selector: "title".to_string(),
                purpose: SelectorPurpose::Metadata,
                attribute: None,
            }],
            rules: JobRules {
                job_timeout_secs: 5,
                ..JobRules::default()
            },
            pipeline: None,
        };

        let event_bus = Arc::new(PipelineEventBus::new(8));
        let pipeline = Pipeline::new(&job, ctx(), event_bus).unwrap();
        assert_eq!(pipeline.deadline, std::time::Duration::from_secs(5));
    }
}
