//! Core PipelineEventBus struct definition and constructors

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize};
use tokio::sync::{Notify, broadcast};

use crate::events::config::EventBusConfig;
use crate::events::metrics::EventBusMetrics;
use crate::events::types::PipelineEvent;

/// Broadcast bus carrying one job's lifecycle and per-item events to
/// whoever is listening -- a job's own status monitor, and potentially an
/// external consumer such as a CLI progress bar or HTTP status endpoint.
/// Cloning shares the same underlying channel; the bus only shuts down once
/// every clone has been dropped.
#[derive(Debug)]
pub struct PipelineEventBus {
    pub(super) sender: broadcast::Sender<PipelineEvent>,
    pub(super) config: Arc<EventBusConfig>,
    pub(super) metrics: EventBusMetrics,
    pub(super) shutdown: Arc<Notify>,
    pub(super) shutdown_flag: Arc<AtomicBool>,
    /// Reference count across clones, so only the last dropped clone signals shutdown.
    pub(super) num_instances: Arc<AtomicUsize>,
}

impl PipelineEventBus {
    /// Create a new event bus with the given buffer capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let config = EventBusConfig {
            capacity,
            ..Default::default()
        };
        Self::with_config(config)
    }

    /// Create a new event bus with custom configuration.
    #[must_use]
    pub fn with_config(config: EventBusConfig) -> Self {
        let (sender, _) = broadcast::channel(config.capacity);
        Self {
            sender,
            config: Arc::new(config),
            metrics: EventBusMetrics::new(),
            shutdown: Arc::new(Notify::new()),
            shutdown_flag: Arc::new(AtomicBool::new(false)),
            num_instances: Arc::new(AtomicUsize::new(1)),
        }
    }

    #[must_use]
    pub fn config(&self) -> &EventBusConfig {
        &self.config
    }

    /// Current metrics. Individual counters are atomic; for a consistent
    /// view across all of them at once, use `metrics().snapshot()`.
    #[must_use]
    pub fn metrics(&self) -> &EventBusMetrics {
        &self.metrics
    }

    /// Current channel fill ratio: 0.0 empty, 1.0 at capacity, >1.0 means
    /// the channel is already dropping the oldest buffered events.
    #[must_use]
    pub fn pressure(&self) -> f64 {
        let current = self.sender.len();
        let capacity = self.config.capacity;
        current as f64 / capacity as f64
    }

    /// True once `pressure()` has crossed `config.overload_threshold`.
    #[must_use]
    pub fn is_overloaded(&self) -> bool {
        self.pressure() >= self.config.overload_threshold
    }

    /// Number of events currently buffered in the channel.
    #[must_use]
    pub fn buffer_len(&self) -> usize {
        self.sender.len()
    }

    /// Buffer slots left before the channel starts dropping events.
    #[must_use]
    pub fn remaining_capacity(&self) -> usize {
        self.config.capacity.saturating_sub(self.sender.len())
    }
}
