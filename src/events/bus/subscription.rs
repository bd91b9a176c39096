//! Subscribing to a running job's event stream.

use tokio::sync::broadcast;

use crate::events::streaming::FilteredReceiver;
use crate::events::types::PipelineEvent;

use super::core::PipelineEventBus;

impl PipelineEventBus {
    /// Open a new receiver on this job's event stream. Each subscriber gets
    /// its own cursor into the broadcast channel -- a slow one falling
    /// behind only drops its own view, never another subscriber's.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.sender.subscribe()
    }

    /// Number of receivers currently attached to this bus.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        let count = self.sender.receiver_count();
        if self.config.enable_metrics {
            self.metrics.update_subscriber_count(count);
        }
        count
    }

    #[must_use]
    pub fn has_subscribers(&self) -> bool {
        self.subscriber_count() > 0
    }

    /// Subscribe, but only wake the caller for events that pass `filter` --
    /// useful for a UI that only cares about one job's `ItemFinished`s, say.
    pub fn subscribe_filtered<F>(&self, filter: F) -> FilteredReceiver<F>
    where
        F: Fn(&PipelineEvent) -> bool + Send + Sync + 'static,
    {
        let receiver = self.subscribe();
        FilteredReceiver::new(receiver, filter)
    }
}
