//! Capability and handle types for readable cells.

use crate::error::Result;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Weak;

use super::store::Publisher;

/// Unique identifier for an observer within one cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObserverId(pub u64);

/// Closure type for observers.
pub type ObserverFn<T> = dyn Fn(&T) + Send + Sync;

/// Releases an upstream subscription.
///
/// Consumed on use, so a subscription can only be released once.
pub struct Deactivate(Box<dyn FnOnce() -> Result<()> + Send>);

impl Deactivate {
    pub fn new(f: impl FnOnce() -> Result<()> + Send + 'static) -> Self {
        Self(Box::new(f))
    }

    /// A release that does nothing, for upstreams with nothing to hold.
    pub fn noop() -> Self {
        Self::new(|| Ok(()))
    }

    pub fn run(self) -> Result<()> {
        (self.0)()
    }
}

impl fmt::Debug for Deactivate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Deactivate(..)")
    }
}

/// Starts an upstream subscription on behalf of a cell.
///
/// Called when the first observer arrives. The implementation must route
/// every upstream change into `publisher` and return the handle that
/// undoes the arrangement. Any closure of the right shape is an activator.
pub trait Activator<T>: Send + Sync {
    fn activate(&self, publisher: Publisher<T>) -> Result<Deactivate>;
}

impl<T, F> Activator<T> for F
where
    F: Fn(Publisher<T>) -> Result<Deactivate> + Send + Sync,
{
    fn activate(&self, publisher: Publisher<T>) -> Result<Deactivate> {
        self(publisher)
    }
}

/// Type-erased side of a cell that observers are removed from.
pub(crate) trait Release: Send + Sync {
    fn release(&self, id: ObserverId) -> Result<()>;
}

/// Handle returned by `subscribe`.
///
/// `unsubscribe` is idempotent. Dropping the handle unsubscribes too; a
/// deactivation error raised during drop is logged rather than returned.
#[must_use = "dropping the handle unsubscribes the observer"]
pub struct Unsubscriber {
    id: ObserverId,
    cell: Weak<dyn Release>,
    done: AtomicBool,
}

impl Unsubscriber {
    pub(crate) fn new(id: ObserverId, cell: Weak<dyn Release>) -> Self {
        Self {
            id,
            cell,
            done: AtomicBool::new(false),
        }
    }

    /// The observer this handle controls.
    pub fn id(&self) -> ObserverId {
        self.id
    }

    /// Whether `unsubscribe` has already run.
    pub fn is_unsubscribed(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }

    /// Remove the observer. Releases the upstream when it was the last one.
    pub fn unsubscribe(&self) -> Result<()> {
        if self.done.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        match self.cell.upgrade() {
            Some(cell) => cell.release(self.id),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Unsubscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unsubscriber")
            .field("id", &self.id)
            .field("done", &self.is_unsubscribed())
            .finish()
    }
}

impl Drop for Unsubscriber {
    fn drop(&mut self) {
        if let Err(e) = self.unsubscribe() {
            tracing::warn!(observer = self.id.0, error = %e, "deactivation failed while dropping subscription");
        }
    }
}
