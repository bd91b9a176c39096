//! Broadcast event bus for tracking pipeline execution
//!
//! Stage workers and the job executor publish lifecycle events here; a
//! job's own status monitor and, potentially, an external consumer (a CLI
//! progress display, an HTTP status endpoint) subscribe to watch them live.

// Sub-modules
pub mod bus;
pub mod config;
pub mod errors;
pub mod metrics;
pub mod streaming;
pub mod types;

// Re-exports for public API
pub use bus::PipelineEventBus;
pub use config::EventBusConfig;
pub use errors::EventBusError;
pub use metrics::EventBusMetrics;
pub use streaming::FilteredReceiver;
pub use types::{PipelineEvent, ShutdownReason};
