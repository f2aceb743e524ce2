//! History sources that a location cell can follow.
//!
//! A source exposes its current [`Location`] at all times and notifies
//! listeners on every change. [`MemoryHistory`] is the in-process
//! implementation.

mod listeners;
mod memory;

pub use listeners::{ListenerFn, ListenerId, Listeners, Unlisten};
pub use memory::{MemoryHistory, MemoryHistoryConfig};

use crate::types::Location;

/// The upstream a location cell subscribes to.
pub trait History: Send + Sync {
    /// The current entry. Always available, no listener needed.
    fn location(&self) -> Location;

    /// Call `listener` on every change until the returned handle is
    /// stopped or dropped.
    fn listen(&self, listener: Box<ListenerFn>) -> Unlisten;
}
