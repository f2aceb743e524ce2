//! Readable cells with lazy upstream activation.
//!
//! A [`Readable`] holds one current value and a list of observers. It only
//! talks to its upstream while somebody is watching:
//! - the first `subscribe` calls the [`Activator`], which receives a
//!   [`Publisher`] and returns a [`Deactivate`] handle
//! - the last `unsubscribe` runs that handle
//!
//! # Example
//!
//! ```ignore
//! let cell = Readable::from_fn(0u32, |publisher| {
//!     let id = ticker.on(move |n| publisher.publish(*n));
//!     Ok(Deactivate::new(move || {
//!         ticker.off(id);
//!         Ok(())
//!     }))
//! });
//!
//! let handle = cell.subscribe(|n| println!("tick {n}"))?;
//! // ...
//! handle.unsubscribe()?;
//! ```

mod store;
mod types;

pub use store::{Publisher, Readable};
pub use types::{Activator, Deactivate, ObserverFn, ObserverId, Unsubscriber};
