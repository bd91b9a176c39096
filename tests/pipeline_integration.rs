//! End-to-end run of a synthesized pipeline against a mock HTTP server:
//! fetch falls back from the (unavailable, in this sandbox) browser pool to
//! plain HTTP, then a terminal extract stage pulls a metadata field.

use std::sync::Arc;
use std::time::Duration;

use scrapetrellis::{
    BrowserPool, BrowserPoolConfig, InMemoryJobStore, JobDescriptor, JobRules, NoopThumbnailGenerator,
    Pipeline, PipelineEventBus, RootedWorkspace, SelectorPurpose, SelectorSpec,
};
use scrapetrellis::fetcher::{Fetcher, FetcherConfig};
use scrapetrellis::processors::ProcessorContext;

fn test_descriptor(base_url: String) -> JobDescriptor {
    JobDescriptor {
        id: "test-job".to_string(),
        base_url,
        selectors: vec![SelectorSpec {
            selector: "title".to_string(),
            purpose: SelectorPurpose::Metadata,
            attribute: Some("text".to_string()),
        }],
        rules: JobRules::default(),
        pipeline: None,
    }
}

#[tokio::test]
async fn pipeline_drains_a_single_metadata_page() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body("<html><head><title>Hello World</title></head><body></body></html>")
        .create_async()
        .await;

    let workspace_dir = tempfile::tempdir().unwrap();
    let ctx = ProcessorContext {
        browser_pool: BrowserPool::new(BrowserPoolConfig::default()),
        fetcher: Fetcher::new(&FetcherConfig::default()).unwrap(),
        job_store: InMemoryJobStore::new(),
        workspace: Arc::new(RootedWorkspace::new(workspace_dir.path())),
        thumbnails: Arc::new(NoopThumbnailGenerator),
        job_id: "test-job".to_string(),
        url_tracker: Arc::new(scrapetrellis::job::executor::UrlTracker::new()),
        asset_permits: Arc::new(tokio::sync::Semaphore::new(5)),
        asset_count: Arc::new(std::sync::atomic::AtomicU64::new(0)),
        max_assets: None,
    };

    let event_bus = Arc::new(PipelineEventBus::new(64));
    let descriptor = test_descriptor(server.url());
    let pipeline = Arc::new(Pipeline::new(&descriptor, ctx, event_bus).unwrap());

    let result = tokio::time::timeout(Duration::from_secs(30), pipeline.execute(descriptor.base_url.clone()))
        .await
        .expect("pipeline did not drain within the timeout");

    assert!(result.is_ok(), "pipeline run failed: {result:?}");
}

#[tokio::test]
async fn pipeline_rejects_job_with_no_entry_points() {
    use scrapetrellis::job::descriptor::PipelineDescriptor;

    let mut descriptor = test_descriptor("https://example.com".to_string());
    descriptor.pipeline = Some(PipelineDescriptor {
        id: "empty".to_string(),
        name: "empty".to_string(),
        description: None,
        stages: std::collections::HashMap::new(),
        entry_points: vec![],
        max_workers: None,
    });

    let ctx = ProcessorContext {
        browser_pool: BrowserPool::new(BrowserPoolConfig::default()),
        fetcher: Fetcher::new(&FetcherConfig::default()).unwrap(),
        job_store: InMemoryJobStore::new(),
        workspace: Arc::new(RootedWorkspace::new(tempfile::tempdir().unwrap().path())),
        thumbnails: Arc::new(NoopThumbnailGenerator),
        job_id: "test-job".to_string(),
        url_tracker: Arc::new(scrapetrellis::job::executor::UrlTracker::new()),
        asset_permits: Arc::new(tokio::sync::Semaphore::new(5)),
        asset_count: Arc::new(std::sync::atomic::AtomicU64::new(0)),
        max_assets: None,
    };
    let event_bus = Arc::new(PipelineEventBus::new(64));

    assert!(Pipeline::new(&descriptor, ctx, event_bus).is_err());
}
