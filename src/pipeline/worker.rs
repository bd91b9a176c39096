//! Per-stage worker loop: dedup, pre/post status events, invoke
//! the matching task processor, route emitted items to the next stages.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex as AsyncMutex;
use tokio::sync::mpsc::Receiver;
use tracing::{debug, warn};

use crate::events::PipelineEvent;
use crate::item::Item;
use crate::processors;
use crate::stage::{OnError, StageId};

use super::runtime::Pipeline;

/// Drain `rx` until the channel closes or the pipeline is cancelled,
/// processing one item at a time through the stage named `stage_id`.
pub(super) async fn run_worker(
    pipeline: Arc<Pipeline>,
    stage_id: StageId,
    rx: Arc<AsyncMutex<Receiver<Item>>>,
) {
    loop {
        if pipeline.is_cancelled() {
            return;
        }

        let item = {
            let mut rx = rx.lock().await;
            rx.recv().await
        };

        let Some(item) = item else {
            return;
        };

        if !pipeline.processed().mark_if_new(&stage_id, &item.id) {
            pipeline.note_completed();
            continue;
        }

        handle_item(&pipeline, &stage_id, item).await;
        pipeline.note_completed();
    }
}

async fn handle_item(pipeline: &Arc<Pipeline>, stage_id: &str, item: Item) {
    let Some(stage) = pipeline.stages.get(stage_id) else {
        warn!(stage_id, "worker running for unknown stage");
        return;
    };

    pipeline
        .publish(PipelineEvent::ItemStarted {
            job_id: pipeline.job_id.clone(),
            stage_id: stage_id.to_string(),
            item_id: item.id.clone(),
            timestamp: chrono::Utc::now(),
        })
        .await;

    let started = Instant::now();
    let mut attempt = 0u32;
    let mut current = item;

    loop {
        match processors::process(pipeline.ctx(), stage, current.clone()).await {
            Ok(emitted) => {
                let count = emitted.len();
                stage.metrics.record_success(started.elapsed());

                for child in emitted {
                    for next in &stage.def.next_stages {
                        pipeline.dispatch(next, child.clone()).await;
                    }
                }

                pipeline
                    .publish(PipelineEvent::ItemFinished {
                        job_id: pipeline.job_id.clone(),
                        stage_id: stage_id.to_string(),
                        item_id: current.id.clone(),
                        emitted: count,
                        duration: started.elapsed(),
                        last_error: None,
                        timestamp: chrono::Utc::now(),
                    })
                    .await;
                return;
            }
            Err(e) => {
                stage.metrics.record_error(started.elapsed());
                match &stage.def.on_error {
                    OnError::Continue => {
                        debug!(stage_id, url = %e.url.clone().unwrap_or_default(), error = %e.message, "stage error, continuing");
                        crate::error_log::record(pipeline.ctx().workspace.as_ref(), &e, true).await;
                        pipeline
                            .publish(PipelineEvent::ItemFinished {
                                job_id: pipeline.job_id.clone(),
                                stage_id: stage_id.to_string(),
                                item_id: current.id.clone(),
                                emitted: 0,
                                duration: started.elapsed(),
                                last_error: Some(e.message.clone()),
                                timestamp: chrono::Utc::now(),
                            })
                            .await;
                        return;
                    }
                    OnError::Abort => {
                        warn!(stage_id, error = %e.message, "stage error, aborting pipeline");
                        crate::error_log::record(pipeline.ctx().workspace.as_ref(), &e, false).await;
                        pipeline
                            .publish(PipelineEvent::ItemFinished {
                                job_id: pipeline.job_id.clone(),
                                stage_id: stage_id.to_string(),
                                item_id: current.id.clone(),
                                emitted: 0,
                                duration: started.elapsed(),
                                last_error: Some(e.message.clone()),
                                timestamp: chrono::Utc::now(),
                            })
                            .await;
                        pipeline.cancel_for_abort();
                        return;
                    }
                    OnError::Retry { max_retries, backoff_secs } => {
                        if attempt >= *max_retries {
                            warn!(stage_id, attempt, error = %e.message, "retries exhausted");
                            crate::error_log::record(pipeline.ctx().workspace.as_ref(), &e, false).await;
                            pipeline
                                .publish(PipelineEvent::ItemFinished {
                                    job_id: pipeline.job_id.clone(),
                                    stage_id: stage_id.to_string(),
                                    item_id: current.id.clone(),
                                    emitted: 0,
                                    duration: started.elapsed(),
                                    last_error: Some(e.message.clone()),
                                    timestamp: chrono::Utc::now(),
                                })
                                .await;
                            return;
                        }
                        attempt += 1;
                        current = current.with_incremented_retry();
                        tokio::time::sleep(std::time::Duration::from_secs(*backoff_secs)).await;
                    }
                }
            }
        }
    }
}
