// Cross-window storage synchronization.
//
// A minimal broadcast channel between windows sharing one storage area. The
// embedding shell publishes a StorageChange whenever another window rewrites
// the area; subscribed stores replace their in-memory state wholesale.
// Last writer wins - no merge is attempted between windows.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

/// One observed mutation of the shared storage area.
/// `new_value = None` means the key was removed.
#[derive(Debug, Clone)]
pub struct StorageChange {
    pub key: String,
    pub new_value: Option<String>,
}

impl StorageChange {
    pub fn set(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            new_value: Some(value.into()),
        }
    }

    pub fn removed(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            new_value: None,
        }
    }
}

/// Receiver side of the channel. Listeners filter by key themselves.
pub trait StorageListener: Send + Sync {
    fn on_storage_change(&self, change: &StorageChange);
}

/// Publish/subscribe fan-out for storage changes. Holds listeners weakly so
/// a dropped store silently unsubscribes.
#[derive(Default)]
pub struct SyncBus {
    listeners: Mutex<Vec<Weak<dyn StorageListener>>>,
}

impl SyncBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<L: StorageListener + 'static>(&self, listener: &Arc<L>) {
        let arc: Arc<dyn StorageListener> = listener.clone();
        let weak: Weak<dyn StorageListener> = Arc::downgrade(&arc);
        self.listeners.lock().push(weak);
    }

    /// Deliver a change to every live listener, pruning dropped ones.
    pub fn publish(&self, change: &StorageChange) {
        let mut listeners = self.listeners.lock();
        listeners.retain(|weak| match weak.upgrade() {
            Some(listener) => {
                listener.on_storage_change(change);
                true
            }
            None => false,
        });
    }
}
