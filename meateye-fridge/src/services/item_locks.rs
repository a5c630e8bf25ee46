//! Per-item mutual exclusion
//!
//! Recompute and the sweep's pre-dispatch re-check both read the item and
//! then mutate its notifications. Holding the item's lock across that window
//! keeps a delete or consume from landing in between.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// Number of idle entries tolerated before the map is pruned
const PRUNE_THRESHOLD: usize = 1024;

#[derive(Clone, Default)]
pub struct ItemLocks {
    locks: Arc<Mutex<HashMap<Uuid, Arc<Mutex<()>>>>>,
}

impl ItemLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `item_id`
    ///
    /// The guard releases the lock when dropped.
    pub async fn acquire(&self, item_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            if locks.len() >= PRUNE_THRESHOLD {
                // Only the map holds an idle lock
                locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            locks.entry(item_id).or_default().clone()
        };

        lock.lock_owned().await
    }

    /// Entries currently tracked
    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.locks.lock().await.is_empty()
    }
}
