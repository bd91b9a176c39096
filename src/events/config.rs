//! Tuning knobs for [`PipelineEventBus`](super::bus::PipelineEventBus).

/// Configuration for the event bus.
#[derive(Debug, Clone)]
pub struct EventBusConfig {
    /// Broadcast channel depth. A slow subscriber that falls this far behind
    /// the fastest publisher starts missing events (`RecvError::Lagged`)
    /// rather than blocking the pipeline.
    pub capacity: usize,

    /// Pressure threshold (0.0-1.0) for `is_overloaded()`.
    /// Default 0.8 means warn once the buffer is 80% full.
    pub overload_threshold: f64,

    /// Whether to track publish/drop/subscriber counters.
    pub enable_metrics: bool,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            overload_threshold: 0.8,
            enable_metrics: true,
        }
    }
}
