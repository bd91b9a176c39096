//! Two-level browser pool: a small set of Chrome processes, each offering
//! several independently checked-out tabs.
//!
//! Checking out a tab never blocks another caller working a different tab
//! of the same browser; only launching a brand-new browser is serialized.

mod browser;
mod error;
mod tab;

pub use browser::PooledBrowser;
pub use error::BrowserPoolError;
pub use tab::{ExtractKind, NetworkLogEntry, TabHandle, TabNetworkError};

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// How long an idle tab can sit before the sweep closes it.
const TAB_IDLE_TIMEOUT: Duration = Duration::from_secs(600);

/// Pool sizing and lifecycle configuration.
#[derive(Debug, Clone)]
pub struct BrowserPoolConfig {
    pub min_browsers: usize,
    pub max_browsers: usize,
    pub max_tabs: usize,
    pub idle_browser_timeout: Duration,
    pub sweep_interval: Duration,
    pub headless: bool,
}

impl Default for BrowserPoolConfig {
    fn default() -> Self {
        Self {
            min_browsers: 1,
            max_browsers: 3,
            max_tabs: 5,
            idle_browser_timeout: Duration::from_secs(1800),
            sweep_interval: Duration::from_secs(300),
            headless: true,
        }
    }
}

/// Owns the set of launched Chrome processes and hands out tabs on demand.
pub struct BrowserPool {
    config: BrowserPoolConfig,
    browsers: AsyncMutex<HashMap<u64, Arc<PooledBrowser>>>,
    next_browser_id: AtomicU64,
    sweeper: AsyncMutex<Option<JoinHandle<()>>>,
    shutdown: AtomicBool,
}

impl BrowserPool {
    #[must_use]
    pub fn new(config: BrowserPoolConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            browsers: AsyncMutex::new(HashMap::new()),
            next_browser_id: AtomicU64::new(0),
            sweeper: AsyncMutex::new(None),
            shutdown: AtomicBool::new(false),
        })
    }

    /// Reclaim profiles orphaned by a previous crash, launch `min_browsers`
    /// up front, and start the idle-browser sweep loop.
    pub async fn start(self: &Arc<Self>) -> Result<(), BrowserPoolError> {
        match crate::browser_profile::cleanup_stale_profiles() {
            Ok(0) => {}
            Ok(n) => info!("reclaimed {n} orphaned browser profile directories"),
            Err(e) => warn!("failed to sweep stale browser profiles: {e}"),
        }

        for _ in 0..self.config.min_browsers {
            self.launch_one().await?;
        }

        let pool = Arc::clone(self);
        let handle = tokio::spawn(async move { sweep_loop(pool).await });
        *self.sweeper.lock().await = Some(handle);
        Ok(())
    }

    /// Check out a tab, preferring an existing browser with spare capacity over
    /// launching a new one.
    pub async fn acquire_tab(self: &Arc<Self>) -> Result<TabHandle, BrowserPoolError> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(BrowserPoolError::Shutdown);
        }

        if let Some(browser) = self.least_loaded_browser().await
            && let Ok(tab) = browser.get_tab().await
        {
            browser::log_tab_checkout(browser.id(), tab.id());
            return Ok(tab);
        }

        let browsers_now = self.browsers.lock().await.len();
        if browsers_now < self.config.max_browsers {
            let browser = self.launch_one().await?;
            return browser.get_tab().await;
        }

        // At capacity: wait for any browser to free a tab slot.
        loop {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if let Some(browser) = self.least_loaded_browser().await
                && let Ok(tab) = browser.get_tab().await
            {
                return Ok(tab);
            }
        }
    }

    async fn launch_one(self: &Arc<Self>) -> Result<Arc<PooledBrowser>, BrowserPoolError> {
        let id = self.next_browser_id.fetch_add(1, Ordering::Relaxed);
        match PooledBrowser::launch(id, self.config.headless, self.config.max_tabs).await {
            Ok(browser) => {
                self.browsers.lock().await.insert(id, Arc::clone(&browser));
                info!("launched browser {id}");
                Ok(browser)
            }
            Err(e) => {
                browser::log_launch_failure(id, &e);
                Err(e)
            }
        }
    }

    async fn least_loaded_browser(&self) -> Option<Arc<PooledBrowser>> {
        let browsers = self.browsers.lock().await;
        if browsers.is_empty() {
            return None;
        }
        let loads = browser::snapshot_loads(&browsers).await;
        let best = loads
            .into_iter()
            .filter(|l| l.tabs < self.config.max_tabs)
            .min_by_key(|l| l.busy)?;
        browsers.get(&best.id).cloned()
    }

    #[must_use]
    pub async fn browser_count(&self) -> usize {
        self.browsers.lock().await.len()
    }

    /// Stop the sweep loop and close every browser.
    pub async fn shutdown(self: &Arc<Self>) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.sweeper.lock().await.take() {
            handle.abort();
        }
        let browsers = self.browsers.lock().await;
        for browser in browsers.values() {
            browser.close().await;
        }
    }
}

async fn sweep_loop(pool: Arc<BrowserPool>) {
    let mut interval = tokio::time::interval(pool.config.sweep_interval);
    loop {
        interval.tick().await;
        if pool.shutdown.load(Ordering::Acquire) {
            return;
        }

        let mut browsers = pool.browsers.lock().await;

        for browser in browsers.values() {
            browser.close_idle_tabs(TAB_IDLE_TIMEOUT).await;
        }

        if browsers.len() <= pool.config.min_browsers {
            continue;
        }

        let mut idle_ids = Vec::new();
        for (id, browser) in browsers.iter() {
            if browser.idle_for() > pool.config.idle_browser_timeout
                && browser.busy_tab_count().await == 0
            {
                idle_ids.push(*id);
            }
        }

        for id in idle_ids {
            if browsers.len() <= pool.config.min_browsers {
                break;
            }
            if let Some(browser) = browsers.remove(&id) {
                browser.close().await;
                warn!("closed idle browser {id}");
            }
        }
    }
}
