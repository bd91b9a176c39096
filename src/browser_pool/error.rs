//! Error type for browser pool operations

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrowserPoolError {
    #[error("failed to launch browser: {0}")]
    LaunchFailed(String),

    #[error("browser pool operation was canceled")]
    Canceled,

    #[error("tab operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("tab operation failed: {0}")]
    TabFailed(String),

    #[error("browser {0} not found in pool")]
    BrowserNotFound(u64),

    #[error("browser pool is shutting down")]
    Shutdown,
}
