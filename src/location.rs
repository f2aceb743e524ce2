//! The location cell: a [`Readable`] bound to a [`History`] source.

use std::sync::Arc;

use crate::history::History;
use crate::readable::{Deactivate, Readable};
use crate::types::{HistoryEvent, Location};

/// Readable cell tracking the current location of a history source.
pub type LocationStore = Readable<Location>;

/// Build a cell that follows `history`.
///
/// The cell starts from the location current at construction. While it has
/// observers it listens to `history`; on each activation it also re-reads
/// the current location, so entries visited while nobody was watching are
/// reflected in the value new observers receive.
///
/// Construct one per history at the application's composition root and
/// hand out clones.
pub fn location_store<H>(history: Arc<H>) -> LocationStore
where
    H: History + 'static,
{
    let initial = history.location();
    Readable::from_fn(initial, move |publisher| {
        let forward = publisher.clone();
        let unlisten = history.listen(Box::new(move |event: &HistoryEvent| {
            forward.publish(event.location.clone());
        }));
        publisher.publish(history.location());

        Ok(Deactivate::new(move || {
            unlisten.unlisten();
            Ok(())
        }))
    })
}
