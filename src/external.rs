//! Traits for collaborators this crate does not implement: persistence,
//! workspace file layout, thumbnail generation. Each trait ships an
//! in-memory or no-op implementation suitable for tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub name: String,
    pub descriptor: Value,
    pub schedule: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub processed_urls: u64,
    pub failed_urls: u64,
    pub total_urls: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub id: String,
    pub job_id: String,
    pub url: String,
    #[serde(rename = "type")]
    pub asset_type: String,
    pub size: Option<u64>,
    pub local_path: Option<String>,
    pub thumbnail_path: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub date: Option<String>,
    pub metadata: HashMap<String, String>,
    pub downloaded: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Setting {
    pub key: String,
    pub value: String,
}

/// Persistence collaborator. Out of scope for this crate; callers wire in a
/// real database-backed implementation.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn save_jobs(&self, jobs: &[Job]) -> anyhow::Result<()>;
    async fn update_job(&self, job: &Job) -> anyhow::Result<()>;
    async fn add_asset(&self, job_id: &str, asset: &Asset) -> anyhow::Result<()>;
}

/// In-memory `JobStore`, used by tests and as a reference implementation.
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: Mutex<HashMap<String, Job>>,
    assets: Mutex<HashMap<String, Vec<Asset>>>,
}

impl InMemoryJobStore {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    #[must_use]
    pub fn jobs_snapshot(&self) -> Vec<Job> {
        self.jobs.lock().values().cloned().collect()
    }

    #[must_use]
    pub fn assets_for(&self, job_id: &str) -> Vec<Asset> {
        self.assets.lock().get(job_id).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn save_jobs(&self, jobs: &[Job]) -> anyhow::Result<()> {
        let mut guard = self.jobs.lock();
        for job in jobs {
            guard.insert(job.id.clone(), job.clone());
        }
        Ok(())
    }

    async fn update_job(&self, job: &Job) -> anyhow::Result<()> {
        self.jobs.lock().insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn add_asset(&self, job_id: &str, asset: &Asset) -> anyhow::Result<()> {
        self.assets
            .lock()
            .entry(job_id.to_string())
            .or_default()
            .push(asset.clone());
        Ok(())
    }
}

/// File-system layout collaborator: where a job's downloads, thumbnails,
/// error screenshots, and structured error log live.
pub trait WorkspacePaths: Send + Sync {
    fn storage_path(&self, job_id: &str) -> PathBuf;
    fn thumbnails_path(&self) -> PathBuf;
    fn errors_path(&self, err_id: &str) -> PathBuf;
    fn logs_path(&self) -> PathBuf;
}

/// Workspace rooted at a single directory:
/// `<root>/storage/<job_id>`, `<root>/thumbnails`, `<root>/errors/<id>.png`,
/// `<root>/logs/scraper_errors.jsonl`.
pub struct RootedWorkspace {
    root: PathBuf,
}

impl RootedWorkspace {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl WorkspacePaths for RootedWorkspace {
    fn storage_path(&self, job_id: &str) -> PathBuf {
        self.root.join("storage").join(job_id)
    }

    fn thumbnails_path(&self) -> PathBuf {
        self.root.join("thumbnails")
    }

    fn errors_path(&self, err_id: &str) -> PathBuf {
        self.root.join("errors").join(format!("{err_id}.png"))
    }

    fn logs_path(&self) -> PathBuf {
        self.root.join("logs").join("scraper_errors.jsonl")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Pdf,
    Generic,
}

/// Thumbnail collaborator: given a downloaded file and its content type,
/// produce a thumbnail and return its path relative to the thumbnails
/// directory. Out of scope for this crate beyond the contract: real encoders
/// (ffmpeg, pdftoppm, image) are external processes/binaries.
#[async_trait]
pub trait ThumbnailGenerator: Send + Sync {
    async fn generate(&self, src_path: &Path, kind: MediaKind) -> anyhow::Result<PathBuf>;
}

/// No-op thumbnail generator: records the call and echoes back a deterministic
/// path without touching the filesystem. Suitable for tests.
#[derive(Default)]
pub struct NoopThumbnailGenerator;

#[async_trait]
impl ThumbnailGenerator for NoopThumbnailGenerator {
    async fn generate(&self, src_path: &Path, kind: MediaKind) -> anyhow::Result<PathBuf> {
        let stem = src_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("thumb");
        let suffix = match kind {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Pdf => "pdf",
            MediaKind::Generic => "generic",
        };
        Ok(PathBuf::from(format!("{stem}.{suffix}.thumb.png")))
    }
}
