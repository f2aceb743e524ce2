//! Listener registry shared by history sources.
//!
//! Listeners are stored as `Arc<dyn Fn(&HistoryEvent)>` and snapshotted on
//! emit, so a listener may stop listening (or start a new listener) from
//! inside its own callback without deadlocking. A listener added during an
//! emit is first called on the next one.

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crate::types::HistoryEvent;

/// Identifies one registered listener.
pub type ListenerId = u64;

/// Closure type for history listeners.
pub type ListenerFn = dyn Fn(&HistoryEvent) + Send + Sync;

/// Ordered set of history listeners.
pub struct Listeners {
    listeners: Mutex<Vec<(ListenerId, Arc<ListenerFn>)>>,
    next_id: AtomicU64,
}

impl Listeners {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register `listener`. The returned handle removes it again.
    pub fn listen(self: &Arc<Self>, listener: Box<ListenerFn>) -> Unlisten {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().push((id, Arc::from(listener)));
        Unlisten {
            id,
            registry: Arc::downgrade(self),
            done: AtomicBool::new(false),
        }
    }

    fn remove(&self, id: ListenerId) {
        self.listeners.lock().retain(|(lid, _)| *lid != id);
    }

    /// Call every listener registered when the emit starts.
    pub fn emit(&self, event: &HistoryEvent) {
        let snapshot: Vec<Arc<ListenerFn>> = {
            let guard = self.listeners.lock();
            guard.iter().map(|(_, cb)| Arc::clone(cb)).collect()
        };
        for cb in snapshot {
            cb(event);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Listeners {
    fn default() -> Self {
        Self::new()
    }
}

/// Stops a history listener. Safe to call more than once; dropping the
/// handle stops the listener as well.
#[must_use = "dropping the handle stops the listener"]
pub struct Unlisten {
    id: ListenerId,
    registry: Weak<Listeners>,
    done: AtomicBool,
}

impl Unlisten {
    /// The listener this handle controls.
    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub fn unlisten(&self) {
        if self.done.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }
}

impl fmt::Debug for Unlisten {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unlisten").field("id", &self.id).finish()
    }
}

impl Drop for Unlisten {
    fn drop(&mut self) {
        self.unlisten();
    }
}
