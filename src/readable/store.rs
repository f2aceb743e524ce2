//! Readable cell with lazy upstream activation.

use crate::error::Result;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};
use tracing::{debug, trace};

use super::types::{Activator, Deactivate, ObserverFn, ObserverId, Release, Unsubscriber};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    /// No upstream subscription.
    Idle,
    /// `activate` is running.
    Activating,
    /// Upstream subscription held.
    Active,
}

struct Inner<T> {
    value: T,
    /// Registration order is delivery order.
    observers: Vec<(ObserverId, Arc<ObserverFn<T>>)>,
    deactivate: Option<Deactivate>,
    phase: Phase,
    /// Bumped on every activation; publishers from older activations are stale.
    epoch: u64,
    /// Values waiting for the running delivery pass.
    pending: VecDeque<T>,
    /// Thread currently allowed to call observers or run `activate`.
    deliverer: Option<ThreadId>,
    next_id: u64,
}

struct Shared<T> {
    inner: Mutex<Inner<T>>,
    /// Signalled whenever `deliverer` is cleared.
    released: Condvar,
    activator: Box<dyn Activator<T>>,
}

/// A read-only observable value that holds an upstream subscription only
/// while it has observers.
///
/// Cloning a `Readable` yields another handle to the same cell.
///
/// # Delivery
///
/// - `subscribe` calls the observer with the current value before it returns.
/// - Each published value reaches every registered observer in one pass,
///   in registration order.
/// - A value published from inside an observer is delivered after the
///   running pass finishes. Values are never reordered.
/// - Values published while `activate` runs replace the current value and
///   reach the first observer as its initial value.
/// - No lock is held while user callbacks run.
///
/// # Threads
///
/// Only one thread at a time activates the upstream or calls observers.
/// A `subscribe` from another thread waits for that thread to finish,
/// including the outcome of a running activation, so its initial value is
/// never overtaken by a later one. A `publish` from another thread queues
/// its value for the delivering thread and returns.
pub struct Readable<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Readable<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Readable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.shared.inner.lock();
        f.debug_struct("Readable")
            .field("value", &inner.value)
            .field("observers", &inner.observers.len())
            .field("phase", &inner.phase)
            .finish()
    }
}

impl<T: Clone + Send + Sync + 'static> Readable<T> {
    /// Create a cell holding `initial`. Nothing upstream happens until the
    /// first `subscribe`.
    pub fn new(initial: T, activator: impl Activator<T> + 'static) -> Self {
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    value: initial,
                    observers: Vec::new(),
                    deactivate: None,
                    phase: Phase::Idle,
                    epoch: 0,
                    pending: VecDeque::new(),
                    deliverer: None,
                    next_id: 1,
                }),
                released: Condvar::new(),
                activator: Box::new(activator),
            }),
        }
    }

    /// Create a cell from a closure activator.
    pub fn from_fn(
        initial: T,
        activate: impl Fn(Publisher<T>) -> Result<Deactivate> + Send + Sync + 'static,
    ) -> Self {
        Self::new(initial, activate)
    }

    /// A cell whose value never changes.
    pub fn constant(value: T) -> Self {
        Self::from_fn(value, |_| Ok(Deactivate::noop()))
    }

    /// Register `observer` and call it with the current value.
    ///
    /// The first observer activates the upstream. If activation fails (or
    /// panics) the registration is rolled back and the error returned.
    /// Observers registered from inside that `activate` call are rolled
    /// back with it.
    pub fn subscribe(
        &self,
        observer: impl Fn(&T) + Send + Sync + 'static,
    ) -> Result<Unsubscriber> {
        let observer: Arc<ObserverFn<T>> = Arc::new(observer);
        let mut token = self.shared.acquire();

        let (id, publisher) = {
            let mut inner = self.shared.inner.lock();
            let id = ObserverId(inner.next_id);
            inner.next_id += 1;
            inner.observers.push((id, Arc::clone(&observer)));

            let publisher = if inner.phase == Phase::Idle {
                inner.phase = Phase::Activating;
                inner.epoch += 1;
                Some(Publisher {
                    shared: Arc::downgrade(&self.shared),
                    epoch: inner.epoch,
                })
            } else {
                None
            };
            (id, publisher)
        };

        if let Some(publisher) = publisher {
            debug!(epoch = publisher.epoch, "activating upstream");
            let mut rollback = ActivationRollback {
                shared: &self.shared,
                armed: true,
            };
            let deactivate = self.shared.activator.activate(publisher)?;
            rollback.armed = false;

            let mut inner = self.shared.inner.lock();
            inner.deactivate = Some(deactivate);
            inner.phase = Phase::Active;
        }

        let current = self.shared.inner.lock().value.clone();
        let weak: Weak<dyn Release> = Arc::downgrade(&self.shared) as Weak<dyn Release>;
        let handle = Unsubscriber::new(id, weak);
        observer(&current);

        if token.held {
            self.shared.drain(&mut token);
        }
        Ok(handle)
    }

    /// Current value.
    ///
    /// When nothing observes the cell this runs one activate/deactivate
    /// cycle so the value reflects the upstream.
    pub fn get(&self) -> Result<T> {
        {
            let inner = self.shared.inner.lock();
            if inner.phase != Phase::Idle {
                return Ok(inner.value.clone());
            }
        }
        let handle = self.subscribe(|_| {})?;
        handle.unsubscribe()?;
        Ok(self.shared.inner.lock().value.clone())
    }

    /// Number of registered observers.
    pub fn observer_count(&self) -> usize {
        self.shared.inner.lock().observers.len()
    }

    /// Whether an upstream subscription is currently held.
    pub fn is_active(&self) -> bool {
        self.shared.inner.lock().phase == Phase::Active
    }
}

impl<T: Clone + Send + Sync + 'static> Shared<T> {
    /// Become the delivering thread, waiting for another thread to finish
    /// if necessary. Re-entry from the delivering thread itself returns a
    /// token that does not hold delivery.
    fn acquire(&self) -> DeliveryToken<'_, T> {
        let me = thread::current().id();
        let mut inner = self.inner.lock();
        loop {
            match inner.deliverer {
                None => {
                    inner.deliverer = Some(me);
                    return DeliveryToken {
                        shared: self,
                        held: true,
                    };
                }
                Some(owner) if owner == me => {
                    return DeliveryToken {
                        shared: self,
                        held: false,
                    };
                }
                Some(_) => self.released.wait(&mut inner),
            }
        }
    }

    fn publish(&self, epoch: u64, value: T) {
        let mut token = {
            let mut inner = self.inner.lock();
            if inner.epoch != epoch || inner.phase == Phase::Idle {
                debug!(epoch, "ignoring publish from a released upstream");
                return;
            }
            if inner.phase == Phase::Activating {
                inner.value = value;
                return;
            }
            inner.pending.push_back(value);
            if inner.deliverer.is_some() {
                trace!(queued = inner.pending.len(), "publish queued behind running delivery");
                return;
            }
            inner.deliverer = Some(thread::current().id());
            DeliveryToken {
                shared: self,
                held: true,
            }
        };
        self.drain(&mut token);
    }

    /// Deliver queued values until none remain, then give up delivery.
    fn drain(&self, token: &mut DeliveryToken<'_, T>) {
        loop {
            let (value, observers) = {
                let mut inner = self.inner.lock();
                let Some(value) = inner.pending.pop_front() else {
                    inner.deliverer = None;
                    token.held = false;
                    drop(inner);
                    self.released.notify_all();
                    return;
                };
                inner.value = value.clone();
                (value, inner.observers.clone())
            };

            for (id, observer) in observers {
                // Skip observers removed earlier in this pass.
                if !self.is_registered(id) {
                    continue;
                }
                observer(&value);
            }
        }
    }

    fn is_registered(&self, id: ObserverId) -> bool {
        self.inner.lock().observers.iter().any(|(oid, _)| *oid == id)
    }
}

impl<T: Clone + Send + Sync + 'static> Release for Shared<T> {
    fn release(&self, id: ObserverId) -> Result<()> {
        let deactivate = {
            let mut inner = self.inner.lock();
            let before = inner.observers.len();
            inner.observers.retain(|(oid, _)| *oid != id);
            if inner.observers.len() == before {
                return Ok(());
            }
            if inner.observers.is_empty() && inner.phase == Phase::Active {
                inner.phase = Phase::Idle;
                inner.pending.clear();
                inner.deactivate.take()
            } else {
                None
            }
        };

        match deactivate {
            Some(deactivate) => {
                debug!("last observer left, deactivating upstream");
                deactivate.run()
            }
            None => Ok(()),
        }
    }
}

/// Right to activate the upstream and call observers. Released on drop,
/// which also covers a panicking observer or activator.
struct DeliveryToken<'a, T> {
    shared: &'a Shared<T>,
    held: bool,
}

impl<T> Drop for DeliveryToken<'_, T> {
    fn drop(&mut self) {
        if !self.held {
            return;
        }
        {
            let mut inner = self.shared.inner.lock();
            if thread::panicking() {
                inner.pending.clear();
            }
            inner.deliverer = None;
        }
        self.shared.released.notify_all();
    }
}

/// Undoes a registration whose activation returned an error or panicked.
struct ActivationRollback<'a, T> {
    shared: &'a Shared<T>,
    armed: bool,
}

impl<T> Drop for ActivationRollback<'_, T> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        debug!("activation failed, rolling back");
        let mut inner = self.shared.inner.lock();
        inner.observers.clear();
        inner.phase = Phase::Idle;
        inner.pending.clear();
    }
}

/// Capability handed to an [`Activator`] for pushing upstream changes.
///
/// A publisher outlives nothing: once its activation has been released,
/// or the cell dropped, `publish` does nothing.
pub struct Publisher<T> {
    shared: Weak<Shared<T>>,
    epoch: u64,
}

impl<T> Clone for Publisher<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Weak::clone(&self.shared),
            epoch: self.epoch,
        }
    }
}

impl<T> fmt::Debug for Publisher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Publisher").field("epoch", &self.epoch).finish()
    }
}

impl<T: Clone + Send + Sync + 'static> Publisher<T> {
    /// Set the cell's value and deliver it to every observer.
    pub fn publish(&self, value: T) {
        match self.shared.upgrade() {
            Some(shared) => shared.publish(self.epoch, value),
            None => trace!("ignoring publish to a dropped cell"),
        }
    }
}
