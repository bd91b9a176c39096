//! Per-launch Chrome profile directories for the browser pool.
//!
//! Two Chrome processes sharing a profile directory collide on
//! `SingletonLock` and refuse to start, so every pooled browser gets its own
//! UUID-named directory under the OS temp dir, cleaned up when its
//! [`BrowserProfile`] handle drops. A crashed process can leave its profile
//! behind with a now-dead `SingletonLock`; [`cleanup_stale_profiles`] sweeps
//! those up at pool startup.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Owns a Chrome profile directory and removes it on drop, unless
/// [`into_path`](Self::into_path) has handed ownership to the launched
/// browser process instead.
#[derive(Debug)]
pub struct BrowserProfile {
    path: PathBuf,
    cleanup_on_drop: bool,
}

impl BrowserProfile {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            cleanup_on_drop: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Hand the directory off to the browser wrapper that now owns its
    /// lifetime, disabling this struct's own cleanup-on-drop.
    pub fn into_path(mut self) -> PathBuf {
        self.cleanup_on_drop = false;
        std::mem::take(&mut self.path)
    }
}

impl Drop for BrowserProfile {
    fn drop(&mut self) {
        if self.cleanup_on_drop && self.path.exists() {
            info!("removing browser profile {}", self.path.display());
            if let Err(e) = std::fs::remove_dir_all(&self.path) {
                warn!("failed to remove profile directory {}: {}", self.path.display(), e);
            }
        }
    }
}

/// Create a uniquely-named profile directory under the OS temp dir, prefixed
/// with `prefix` (the pool uses this to tag profiles by the subsystem that
/// launched them). Uses `create_dir`, not `create_dir_all`, so a UUID
/// collision fails loudly instead of silently reusing an existing directory.
pub fn create_unique_profile_with_prefix(prefix: &str) -> Result<BrowserProfile> {
    let uuid = Uuid::new_v4();
    let path = std::env::temp_dir().join(format!("{prefix}_{uuid}"));

    debug!("creating browser profile: {}", path.display());

    std::fs::create_dir(&path)
        .with_context(|| format!("failed to create profile directory: {}", path.display()))?;

    info!("created browser profile directory: {}", path.display());
    Ok(BrowserProfile::new(path))
}

/// Check whether `profile_dir`'s `SingletonLock` refers to a process that no
/// longer exists. The lock is a symlink whose target is `{hostname}-{pid}`.
#[cfg(unix)]
pub fn is_singleton_lock_stale(profile_dir: &Path) -> bool {
    let lock_path = profile_dir.join("SingletonLock");

    if !lock_path.exists() && !lock_path.is_symlink() {
        return true;
    }

    match std::fs::read_link(&lock_path) {
        Ok(target) => {
            let target_str = target.to_string_lossy();

            if let Some(pid_str) = target_str.rsplit('-').next()
                && let Ok(pid) = pid_str.parse::<i32>()
            {
                // kill(pid, 0) sends no signal but reports whether pid is
                // live and signalable; ESRCH means it's gone.
                let exists = unsafe { libc::kill(pid, 0) == 0 };
                if !exists {
                    info!("stale SingletonLock: pid {pid} no longer exists");
                    return true;
                }
                return false;
            }
            warn!("could not parse pid from SingletonLock target: {target_str}");
            false
        }
        // Not a symlink despite existing -- likely corrupted, treat as stale.
        Err(e) => {
            debug!("could not read SingletonLock as symlink: {e}");
            lock_path.is_file()
        }
    }
}

#[cfg(not(unix))]
pub fn is_singleton_lock_stale(_profile_dir: &Path) -> bool {
    // No reliable liveness check off Unix; UUID-named directories already
    // prevent two live browsers from colliding, so treat every lock as dead.
    true
}

/// Remove every `scrapetrellis_chrome_`-prefixed directory in the temp dir
/// whose `SingletonLock` is stale. Called once by the pool at startup to
/// reclaim profiles orphaned by a previous crash.
pub fn cleanup_stale_profiles() -> Result<usize> {
    let temp_dir = std::env::temp_dir();
    let mut cleaned = 0;

    let entries = std::fs::read_dir(&temp_dir)
        .with_context(|| format!("failed to read temp directory: {}", temp_dir.display()))?;

    for entry in entries.flatten() {
        let path = entry.path();

        if let Some(name) = path.file_name().and_then(|n| n.to_str())
            && name.starts_with("scrapetrellis_chrome_")
            && path.is_dir()
            && is_singleton_lock_stale(&path)
        {
            info!("cleaning stale profile: {}", path.display());
            if let Err(e) = std::fs::remove_dir_all(&path) {
                warn!("failed to remove stale profile {}: {}", path.display(), e);
            } else {
                cleaned += 1;
            }
        }
    }

    if cleaned > 0 {
        info!("cleaned {cleaned} stale Chrome profile directories");
    }

    Ok(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn into_path_disables_cleanup_on_drop() {
        let profile = create_unique_profile_with_prefix("scrapetrellis_chrome_test").unwrap();
        let path = profile.into_path();
        assert!(path.exists());
        std::fs::remove_dir_all(&path).unwrap();
    }

    #[test]
    fn dropping_without_into_path_removes_the_directory() {
        let path = {
            let profile = create_unique_profile_with_prefix("scrapetrellis_chrome_test").unwrap();
            profile.path().to_path_buf()
        };
        assert!(!path.exists());
    }
}
