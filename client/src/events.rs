//! In-process notifications.
//!
//! A review refresh publishes [`ReviewsUpdated`] so that whatever is showing
//! that restaurant can reload from the local store.

use tablesync_engine::RestaurantId;
use tokio::sync::broadcast;

/// Default number of events a slow subscriber may fall behind by.
pub const DEFAULT_CAPACITY: usize = 64;

/// Reviews for a restaurant were re-fetched and stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewsUpdated {
    pub restaurant_id: RestaurantId,
}

/// Broadcast channel for [`ReviewsUpdated`].
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ReviewsUpdated>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReviewsUpdated> {
        self.sender.subscribe()
    }

    /// Publish an event. Returns how many subscribers received it.
    pub fn publish(&self, event: ReviewsUpdated) -> usize {
        match self.sender.send(event) {
            Ok(count) => count,
            Err(_) => {
                tracing::trace!(restaurant_id = event.restaurant_id, "No event subscribers");
                0
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
