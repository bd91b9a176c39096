//! CLI entry point: run a single scrape job described by a JSON file on
//! disk, logging progress to stderr until it drains or is interrupted.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use scrapetrellis::{InMemoryJobStore, JobDescriptor, NoopThumbnailGenerator, RootedWorkspace};

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let mut args = std::env::args().skip(1);
    let descriptor_path: PathBuf = args
        .next()
        .context("usage: scrapetrellis <job-descriptor.json> [workspace-dir]")?
        .into();
    let workspace_dir = args.next().unwrap_or_else(|| "./scrapetrellis-workspace".to_string());

    let raw = tokio::fs::read_to_string(&descriptor_path)
        .await
        .with_context(|| format!("failed to read job descriptor at {descriptor_path:?}"))?;
    let descriptor: JobDescriptor =
        serde_json::from_str(&raw).context("job descriptor is not valid JSON")?;

    tracing::info!(job_id = %descriptor.id, base_url = %descriptor.base_url, "starting job");

    let job_store = InMemoryJobStore::new();
    let workspace = Arc::new(RootedWorkspace::new(workspace_dir));
    let thumbnails = Arc::new(NoopThumbnailGenerator);

    let run = scrapetrellis::run_job(descriptor, job_store.clone(), workspace, thumbnails);

    tokio::select! {
        result = run => {
            result.context("job failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("interrupted, exiting without waiting for the job to drain");
        }
    }

    for job in job_store.jobs_snapshot() {
        tracing::info!(job_id = %job.id, status = %job.status, processed = job.processed_urls, failed = job.failed_urls, "final job status");
    }

    Ok(())
}
