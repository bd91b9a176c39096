//! Publishing operations for the PipelineEventBus

use crate::events::errors::EventBusError;
use crate::events::types::PipelineEvent;

use super::core::PipelineEventBus;

impl PipelineEventBus {
    /// Publish an event to all subscribers. Never blocks: a subscriber that
    /// has fallen behind the channel capacity simply misses the event
    /// (`RecvError::Lagged` on its next `recv()`).
    ///
    /// # Returns
    /// * `Ok(usize)` - Number of active subscribers that received the event
    /// * `Err(EventBusError::NoSubscribers)` - Nobody is currently listening
    pub async fn publish(&self, event: PipelineEvent) -> Result<usize, EventBusError> {
        if let Ok(subscriber_count) = self.sender.send(event) {
            if self.config.enable_metrics {
                self.metrics.increment_published();
                self.metrics.update_subscriber_count(subscriber_count);

                if subscriber_count == 0 {
                    self.metrics.increment_dropped();
                    log::debug!("Published event but no active subscribers");
                }
            }
            Ok(subscriber_count)
        } else {
            if self.config.enable_metrics {
                self.metrics.increment_failed();
            }
            Err(EventBusError::NoSubscribers)
        }
    }
}
