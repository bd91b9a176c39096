//! Error types for event bus operations.

/// Error types for event bus operations.
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    /// No active subscribers when publishing.
    #[error("No active subscribers")]
    NoSubscribers,

    /// Receiver couldn't keep up, missed messages.
    #[error("Receiver lagged behind, missed {0} messages")]
    ReceiverLagged(u64),

    /// Event bus or receiver was closed.
    #[error("Event bus shutdown")]
    Shutdown,
}
