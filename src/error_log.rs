//! Structured, append-only error log written alongside a job's other
//! workspace artifacts: one JSON line per unrecoverable item failure, with
//! an HTML snippet and a saved screenshot when the processor captured one.

use chrono::Utc;
use serde::Serialize;
use tokio::io::AsyncWriteExt;

use crate::error::ProcessorError;
use crate::external::WorkspacePaths;
use crate::utils::string_utils::safe_truncate_chars;

const HTML_SNIPPET_CHARS: usize = 500;

#[derive(Debug, Serialize)]
struct ErrorLogEntry {
    url: Option<String>,
    stage: String,
    stage_id: String,
    error: String,
    timestamp: chrono::DateTime<Utc>,
    recoverable: bool,
    html_snippet: Option<String>,
    screenshot_path: Option<String>,
}

/// Append one entry to `workspace.logs_path()`, saving `err.screenshot` to
/// `workspace.errors_path()` first if present. Best-effort: a write failure
/// is logged via `tracing` rather than propagated, since losing a log entry
/// must never fail the pipeline.
pub async fn record(workspace: &dyn WorkspacePaths, err: &ProcessorError, recoverable: bool) {
    let screenshot_path = match &err.screenshot {
        Some(bytes) => save_screenshot(workspace, bytes).await,
        None => None,
    };

    let entry = ErrorLogEntry {
        url: err.url.clone(),
        stage: err.stage.clone(),
        stage_id: err.stage_id.clone(),
        error: err.message.clone(),
        timestamp: Utc::now(),
        recoverable,
        html_snippet: err.html.as_deref().map(|h| safe_truncate_chars(h, HTML_SNIPPET_CHARS).to_string()),
        screenshot_path,
    };

    if let Err(e) = append_line(workspace, &entry).await {
        tracing::warn!(error = %e, "failed to write structured error log entry");
    }
}

async fn save_screenshot(workspace: &dyn WorkspacePaths, bytes: &[u8]) -> Option<String> {
    let id = uuid::Uuid::new_v4().to_string();
    let path = workspace.errors_path(&id);
    if let Some(parent) = path.parent() {
        let _ = tokio::fs::create_dir_all(parent).await;
    }
    match tokio::fs::write(&path, bytes).await {
        Ok(()) => Some(path.display().to_string()),
        Err(e) => {
            tracing::warn!(error = %e, "failed to save error screenshot");
            None
        }
    }
}

async fn append_line(workspace: &dyn WorkspacePaths, entry: &ErrorLogEntry) -> anyhow::Result<()> {
    let path = workspace.logs_path();
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let line = serde_json::to_string(entry)?;
    let mut file = tokio::fs::OpenOptions::new().create(true).append(true).open(&path).await?;
    file.write_all(line.as_bytes()).await?;
    file.write_all(b"\n").await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::RootedWorkspace;

    #[tokio::test]
    async fn record_appends_one_json_line_per_call() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = RootedWorkspace::new(dir.path());

        let err = ProcessorError::new("fetch-1", "fetch", "connection refused").with_url("https://example.com");
        record(&workspace, &err, true).await;
        record(&workspace, &err, false).await;

        let contents = tokio::fs::read_to_string(workspace.logs_path()).await.unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let parsed: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed["url"], "https://example.com");
        assert_eq!(parsed["stage_id"], "fetch-1");
        assert_eq!(parsed["recoverable"], true);
    }
}
