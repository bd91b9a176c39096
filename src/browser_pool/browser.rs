//! A single pooled browser instance, owning a small set of tabs.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chromiumoxide::Browser;
use parking_lot::Mutex as SyncMutex;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::browser_profile::{self, BrowserProfile};
use crate::browser_setup;

use super::error::BrowserPoolError;
use super::tab::{NetworkLogEntry, PooledTab, TabHandle};

/// A launched Chrome instance with its own CDP event-handler task and a bounded
/// set of tabs. Tabs are checked out individually so a caller's page work never
/// blocks another caller using a different tab of the same browser.
pub struct PooledBrowser {
    pub(super) id: u64,
    browser: Browser,
    _handler: JoinHandle<()>,
    _profile: Option<BrowserProfile>,
    user_agent: &'static str,
    max_tabs: usize,
    tabs: AsyncMutex<Vec<PooledTab>>,
    next_tab_id: AtomicU64,
    pub(super) last_used: SyncMutex<Instant>,
    pub(super) closed: AtomicBool,
}

impl PooledBrowser {
    pub(super) async fn launch(id: u64, headless: bool, max_tabs: usize) -> Result<Arc<Self>, BrowserPoolError> {
        let profile = browser_profile::create_unique_profile_with_prefix("scrapetrellis_chrome_pool")
            .map_err(|e| BrowserPoolError::LaunchFailed(e.to_string()))?;

        let (browser, handler_task, _user_data_dir, user_agent) =
            browser_setup::launch_browser(headless, Some(profile.path().to_path_buf()))
                .await
                .map_err(|e| BrowserPoolError::LaunchFailed(e.to_string()))?;

        Ok(Arc::new(Self {
            id,
            browser,
            _handler: handler_task,
            _profile: Some(profile),
            user_agent,
            max_tabs,
            tabs: AsyncMutex::new(Vec::new()),
            next_tab_id: AtomicU64::new(0),
            last_used: SyncMutex::new(Instant::now()),
            closed: AtomicBool::new(false),
        }))
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Check this browser's control connection is still alive.
    pub async fn is_healthy(&self) -> bool {
        !self.closed.load(Ordering::Acquire) && self.browser.version().await.is_ok()
    }

    #[must_use]
    pub fn idle_for(&self) -> Duration {
        self.last_used.lock().elapsed()
    }

    /// Reuse an idle tab if one is free, otherwise open a new one (up to
    /// `max_tabs`), and hand back a `TabHandle`.
    pub(super) async fn get_tab(
        self: &Arc<Self>,
    ) -> Result<TabHandle, BrowserPoolError> {
        *self.last_used.lock() = Instant::now();
        let mut tabs = self.tabs.lock().await;

        if let Some(slot) = tabs.iter_mut().find(|t| !t.busy) {
            slot.busy = true;
            slot.touch();
            return Ok(TabHandle {
                browser: Arc::clone(self),
                tab_id: slot.id,
                page: slot.page.clone(),
                network_log: Arc::clone(&slot.network_log),
            });
        }

        if tabs.len() >= self.max_tabs {
            return Err(BrowserPoolError::TabFailed(
                "browser has no free tab slots".to_string(),
            ));
        }

        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserPoolError::TabFailed(e.to_string()))?;

        if let Err(e) = browser_setup::apply_stealth_measures(&page, self.user_agent).await {
            warn!("failed to apply stealth measures to new page: {e}");
        }

        let tab_id = self.next_tab_id.fetch_add(1, Ordering::Relaxed);
        let network_log = Arc::new(AsyncMutex::new(Vec::<NetworkLogEntry>::new()));

        tabs.push(PooledTab {
            id: tab_id,
            page: page.clone(),
            busy: true,
            last_used: Instant::now(),
            network_log: Arc::clone(&network_log),
        });

        Ok(TabHandle {
            browser: Arc::clone(self),
            tab_id,
            page,
            network_log,
        })
    }

    pub(super) async fn mark_tab_idle(&self, tab_id: u64) {
        let mut tabs = self.tabs.lock().await;
        if let Some(slot) = tabs.iter_mut().find(|t| t.id == tab_id) {
            slot.busy = false;
            slot.touch();
        }
    }

    pub(super) async fn tab_count(&self) -> usize {
        self.tabs.lock().await.len()
    }

    pub(super) async fn busy_tab_count(&self) -> usize {
        self.tabs.lock().await.iter().filter(|t| t.busy).count()
    }

    /// Close every idle tab that has sat unused longer than `idle_timeout`.
    pub(super) async fn close_idle_tabs(&self, idle_timeout: Duration) {
        let mut tabs = self.tabs.lock().await;
        let mut i = 0;
        while i < tabs.len() {
            if !tabs[i].busy && tabs[i].last_used.elapsed() > idle_timeout {
                let tab = tabs.remove(i);
                let _ = tab.page.close().await;
            } else {
                i += 1;
            }
        }
    }

    pub(super) async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        let mut tabs = self.tabs.lock().await;
        for tab in tabs.drain(..) {
            let _ = tab.page.close().await;
        }
    }
}

/// Per-browser load snapshot used by the pool's placement heuristic.
#[derive(Debug, Clone)]
pub(super) struct BrowserLoad {
    pub id: u64,
    pub tabs: usize,
    pub busy: usize,
}

pub(super) async fn snapshot_loads(
    browsers: &HashMap<u64, Arc<PooledBrowser>>,
) -> Vec<BrowserLoad> {
    let mut loads = Vec::with_capacity(browsers.len());
    for browser in browsers.values() {
        loads.push(BrowserLoad {
            id: browser.id,
            tabs: browser.tab_count().await,
            busy: browser.busy_tab_count().await,
        });
    }
    loads
}

pub(super) fn log_launch_failure(id: u64, err: &BrowserPoolError) {
    warn!("browser {id} failed to launch: {err}");
}

pub(super) fn log_tab_checkout(browser_id: u64, tab_id: u64) {
    debug!("checked out tab {tab_id} on browser {browser_id}");
}
