//! Streaming and filtering functionality for event receivers
//!
//! This module provides filtered event receivers and streaming utilities
//! for selective event consumption.

use std::sync::Arc;
use tokio::sync::broadcast;

use super::errors::EventBusError;
use super::types::PipelineEvent;

/// Filtered event receiver wrapper
pub struct FilteredReceiver<F>
where
    F: Fn(&PipelineEvent) -> bool + Send + Sync + 'static,
{
    receiver: broadcast::Receiver<PipelineEvent>,
    filter: Arc<F>,
}

impl<F> FilteredReceiver<F>
where
    F: Fn(&PipelineEvent) -> bool + Send + Sync + 'static,
{
    pub fn new(receiver: broadcast::Receiver<PipelineEvent>, filter: F) -> Self {
        Self {
            receiver,
            filter: Arc::new(filter),
        }
    }

    /// Receive the next filtered event
    ///
    /// Waits for the next event that passes the filter. Preserves the receiver's
    /// buffered state between calls - no events are lost.
    ///
    /// # Returns
    /// * `Ok(PipelineEvent)` - The next event that passes the filter
    /// * `Err(EventBusError)` - If receiving failed or receiver lagged
    pub async fn recv(&mut self) -> Result<PipelineEvent, EventBusError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if (self.filter)(&event) {
                        return Ok(event);
                    }
                    // Continue loop to check next buffered event
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(EventBusError::Shutdown);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    return Err(EventBusError::ReceiverLagged(skipped));
                }
            }
        }
    }

    /// Check if this receiver will receive specific event types
    ///
    /// # Arguments
    /// * `event` - Test event to check against filter
    #[must_use]
    pub fn would_receive(&self, event: &PipelineEvent) -> bool {
        (self.filter)(event)
    }
}
