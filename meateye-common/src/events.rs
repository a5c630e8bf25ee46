//! Event types for the Meat-A-Eye event system
//!
//! Provides the shared `FridgeEvent` definitions and the broadcast `EventBus`.
//! Events are advisory: nothing in the fridge lifecycle depends on a listener
//! being attached.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Fridge lifecycle and notification events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FridgeEvent {
    /// A new item was stored
    ItemCreated {
        item_id: Uuid,
        member_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// Name, alert preference or expiry of an item changed
    ItemUpdated {
        item_id: Uuid,
        member_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// Item reached its terminal consumed state
    ItemConsumed {
        item_id: Uuid,
        member_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// Item removed; its notification history is kept without the back-reference
    ItemDeleted {
        item_id: Uuid,
        member_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// A pending notification intent was (re)created
    NotificationScheduled {
        notification_id: Uuid,
        item_id: Option<Uuid>,
        scheduled_at: DateTime<Utc>,
    },

    /// Delivery succeeded (push or in-app)
    NotificationSent {
        notification_id: Uuid,
        member_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// Delivery attempt failed
    NotificationFailed {
        notification_id: Uuid,
        member_id: Uuid,
        attempts: u32,
        /// False once the attempt budget is exhausted
        will_retry: bool,
        timestamp: DateTime<Utc>,
    },

    /// The gateway reported an endpoint as gone and it was removed
    SubscriptionRemoved {
        member_id: Uuid,
        endpoint: String,
        timestamp: DateTime<Utc>,
    },
}

/// Broadcast bus for [`FridgeEvent`]s
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<FridgeEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// * `capacity` - Number of events to buffer before slow receivers lag
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<FridgeEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: FridgeEvent,
    ) -> Result<usize, broadcast::error::SendError<FridgeEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: FridgeEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
