//! Durable persistence of the offline action queue.
//!
//! The queue is stored as one JSON array under a single key. Every update
//! rewrites the whole array in a single statement, which keeps each
//! mutation all-or-nothing and preserves insertion order byte-for-byte.

use brillprime_shared::constants::OFFLINE_QUEUE_KEY;
use brillprime_shared::PendingAction;

use crate::database::Store;
use crate::error::Result;

impl Store {
    /// Load the persisted queue. An absent or corrupt record loads as empty.
    pub fn load_pending_actions(&self) -> Result<Vec<PendingAction>> {
        Ok(self.get_item(OFFLINE_QUEUE_KEY)?.unwrap_or_default())
    }

    /// Overwrite the persisted queue with `actions`.
    pub fn store_pending_actions(&self, actions: &[PendingAction]) -> Result<()> {
        self.set_item(OFFLINE_QUEUE_KEY, actions)
    }

    /// Drop the persisted queue.
    pub fn clear_pending_actions(&self) -> Result<()> {
        self.remove_item(OFFLINE_QUEUE_KEY)
    }
}
