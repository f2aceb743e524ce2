//! # Location Store
//!
//! A read-only reactive cell that republishes the current location of a
//! history source, holding its history listener only while observed.
//!
//! ## Core Concepts
//!
//! - **Readable**: Single-value observable that activates its upstream on
//!   the first observer and releases it after the last
//! - **History**: Upstream that exposes the current location and change
//!   notifications
//! - **MemoryHistory**: In-process history with push, replace, back and forward
//!
//! ## Example
//!
//! ```ignore
//! use location_store::{location_store, MemoryHistory, NavigateOptions};
//! use std::sync::Arc;
//!
//! let history = Arc::new(MemoryHistory::starting_at("/home")?);
//! let location = location_store(Arc::clone(&history));
//!
//! let handle = location.subscribe(|loc| println!("now at {loc}"))?;
//! history.navigate("/about", NavigateOptions::default())?;
//! handle.unsubscribe()?;
//! ```

pub mod error;
pub mod history;
pub mod location;
pub mod readable;
pub mod types;

// Re-exports
pub use error::{Result, StoreError};
pub use history::{
    History, ListenerFn, ListenerId, Listeners, MemoryHistory, MemoryHistoryConfig, Unlisten,
};
pub use location::{location_store, LocationStore};
pub use readable::{
    Activator, Deactivate, ObserverFn, ObserverId, Publisher, Readable, Unsubscriber,
};
pub use types::*;
