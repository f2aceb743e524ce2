//! In-process history source backed by an entry stack.

use parking_lot::{Mutex, ReentrantMutex};
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

use super::listeners::{ListenerFn, Listeners, Unlisten};
use super::History;
use crate::error::Result;
use crate::types::{HistoryAction, HistoryEvent, Location, NavigateOptions};

/// Configuration for a [`MemoryHistory`].
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct MemoryHistoryConfig {
    /// Href of the entry the history starts on.
    /// Default: "/"
    pub initial_entry: String,

    /// Entries kept before the oldest is evicted.
    /// Default: 1000
    pub max_entries: usize,
}

impl Default for MemoryHistoryConfig {
    fn default() -> Self {
        Self {
            initial_entry: "/".to_string(),
            max_entries: 1000,
        }
    }
}

struct Entries {
    stack: Vec<Location>,
    index: usize,
}

/// A history that lives entirely in memory.
///
/// Behaves like a browser session history: pushing truncates any forward
/// entries, and `back`/`forward`/`go` move a cursor and report `Pop`.
pub struct MemoryHistory {
    entries: Mutex<Entries>,
    /// Held across a change and its notification so listeners see changes
    /// in the order they were made. Re-entrant so listeners may navigate.
    navigation: ReentrantMutex<()>,
    listeners: Arc<Listeners>,
    next_key: AtomicU64,
    max_entries: usize,
}

impl MemoryHistory {
    /// Create a history positioned on `config.initial_entry`.
    pub fn new(config: MemoryHistoryConfig) -> Result<Self> {
        let initial = Location::parse(&config.initial_entry)?;
        Ok(Self {
            entries: Mutex::new(Entries {
                stack: vec![initial],
                index: 0,
            }),
            navigation: ReentrantMutex::new(()),
            listeners: Arc::new(Listeners::new()),
            next_key: AtomicU64::new(1),
            max_entries: config.max_entries.max(1),
        })
    }

    /// Create a history starting at `href` with default limits.
    pub fn starting_at(href: &str) -> Result<Self> {
        Self::new(MemoryHistoryConfig {
            initial_entry: href.to_string(),
            ..Default::default()
        })
    }

    /// Move to `to`, pushing a new entry or replacing the current one.
    pub fn navigate(&self, to: &str, options: NavigateOptions) -> Result<()> {
        let key = self.next_key.fetch_add(1, Ordering::Relaxed).to_string();
        let location = Location::parse(to)?.with_state(options.state).with_key(key);

        let _navigation = self.navigation.lock();
        let action = {
            let mut entries = self.entries.lock();
            if options.replace {
                let index = entries.index;
                entries.stack[index] = location.clone();
                HistoryAction::Replace
            } else {
                let keep = entries.index + 1;
                entries.stack.truncate(keep);
                entries.stack.push(location.clone());
                if entries.stack.len() > self.max_entries {
                    let excess = entries.stack.len() - self.max_entries;
                    entries.stack.drain(..excess);
                }
                entries.index = entries.stack.len() - 1;
                HistoryAction::Push
            }
        };

        debug!(href = %location, ?action, "navigated");
        self.listeners.emit(&HistoryEvent { location, action });
        Ok(())
    }

    /// Move the cursor by `delta` entries. Returns false, without
    /// notifying, when the target is out of range or `delta` is zero.
    pub fn go(&self, delta: isize) -> bool {
        let _navigation = self.navigation.lock();
        let location = {
            let mut entries = self.entries.lock();
            let target = match entries.index.checked_add_signed(delta) {
                Some(target) if delta != 0 && target < entries.stack.len() => target,
                _ => return false,
            };
            entries.index = target;
            entries.stack[entries.index].clone()
        };

        debug!(href = %location, delta, "popped");
        self.listeners.emit(&HistoryEvent {
            location,
            action: HistoryAction::Pop,
        });
        true
    }

    pub fn back(&self) -> bool {
        self.go(-1)
    }

    pub fn forward(&self) -> bool {
        self.go(1)
    }

    /// All entries, oldest first.
    pub fn entries(&self) -> Vec<Location> {
        self.entries.lock().stack.clone()
    }

    /// Position of the current entry within `entries()`.
    pub fn index(&self) -> usize {
        self.entries.lock().index
    }

    /// Number of active listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl History for MemoryHistory {
    fn location(&self) -> Location {
        let entries = self.entries.lock();
        entries.stack[entries.index].clone()
    }

    fn listen(&self, listener: Box<ListenerFn>) -> Unlisten {
        self.listeners.listen(listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::INITIAL_KEY;
    use serde_json::json;

    fn record(history: &MemoryHistory) -> (Arc<Mutex<Vec<HistoryEvent>>>, Unlisten) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let handle = history.listen(Box::new(move |e: &HistoryEvent| sink.lock().push(e.clone())));
        (events, handle)
    }

    #[test]
    fn test_starts_on_initial_entry() {
        let history = MemoryHistory::starting_at("/home?tab=1").unwrap();
        let loc = history.location();
        assert_eq!(loc.pathname, "/home");
        assert_eq!(loc.search, "?tab=1");
        assert_eq!(loc.key, INITIAL_KEY);
        assert_eq!(history.index(), 0);
    }

    #[test]
    fn test_push_and_replace() {
        let history = MemoryHistory::new(MemoryHistoryConfig::default()).unwrap();
        let (events, _handle) = record(&history);

        history
            .navigate("/about", NavigateOptions::with_state(json!({"from": "home"})))
            .unwrap();
        history.navigate("/contact", NavigateOptions::replace()).unwrap();

        let events = events.lock();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].action, HistoryAction::Push);
        assert_eq!(events[0].location.state, Some(json!({"from": "home"})));
        assert_eq!(events[1].action, HistoryAction::Replace);
        assert_ne!(events[0].location.key, events[1].location.key);

        let hrefs: Vec<String> = history.entries().iter().map(Location::href).collect();
        assert_eq!(hrefs, vec!["/", "/contact"]);
        assert_eq!(history.location().pathname, "/contact");
    }

    #[test]
    fn test_back_forward_and_truncation() {
        let history = MemoryHistory::starting_at("/a").unwrap();
        history.navigate("/b", NavigateOptions::default()).unwrap();
        history.navigate("/c", NavigateOptions::default()).unwrap();
        let (events, _handle) = record(&history);

        assert!(history.back());
        assert!(history.back());
        assert!(!history.back());
        assert_eq!(history.location().pathname, "/a");
        assert!(history.forward());
        assert_eq!(history.location().pathname, "/b");

        history.navigate("/d", NavigateOptions::default()).unwrap();
        let hrefs: Vec<String> = history.entries().iter().map(Location::href).collect();
        assert_eq!(hrefs, vec!["/a", "/b", "/d"]);
        assert!(!history.forward());

        let actions: Vec<HistoryAction> = events.lock().iter().map(|e| e.action).collect();
        assert_eq!(
            actions,
            vec![
                HistoryAction::Pop,
                HistoryAction::Pop,
                HistoryAction::Pop,
                HistoryAction::Push
            ]
        );
    }

    #[test]
    fn test_go_zero_is_noop() {
        let history = MemoryHistory::starting_at("/a").unwrap();
        let (events, _handle) = record(&history);
        assert!(!history.go(0));
        assert!(events.lock().is_empty());
    }

    #[test]
    fn test_go_extreme_deltas_are_out_of_range() {
        let history = MemoryHistory::starting_at("/a").unwrap();
        history.navigate("/b", NavigateOptions::default()).unwrap();
        let (events, _handle) = record(&history);

        assert!(!history.go(isize::MAX));
        assert!(!history.go(isize::MIN));
        assert!(!history.go(-2));
        assert_eq!(history.index(), 1);
        assert!(events.lock().is_empty());

        assert!(history.go(-1));
        assert_eq!(history.location().pathname, "/a");
    }

    #[test]
    fn test_listener_may_navigate() {
        let history = Arc::new(MemoryHistory::starting_at("/").unwrap());
        let inner = Arc::clone(&history);
        let _redirect = history.listen(Box::new(move |e: &HistoryEvent| {
            if e.location.pathname == "/old" {
                inner.navigate("/new", NavigateOptions::replace()).unwrap();
            }
        }));

        history.navigate("/old", NavigateOptions::default()).unwrap();
        assert_eq!(history.location().pathname, "/new");
    }

    #[test]
    fn test_max_entries_evicts_oldest() {
        let history = MemoryHistory::new(MemoryHistoryConfig {
            initial_entry: "/0".to_string(),
            max_entries: 3,
        })
        .unwrap();
        for i in 1..=4 {
            history
                .navigate(&format!("/{}", i), NavigateOptions::default())
                .unwrap();
        }
        let hrefs: Vec<String> = history.entries().iter().map(Location::href).collect();
        assert_eq!(hrefs, vec!["/2", "/3", "/4"]);
        assert_eq!(history.index(), 2);
    }

    #[test]
    fn test_rejects_relative_target() {
        let history = MemoryHistory::starting_at("/").unwrap();
        assert!(history.navigate("about", NavigateOptions::default()).is_err());
        assert_eq!(history.entries().len(), 1);
    }

    #[test]
    fn test_config_from_json() {
        let config: MemoryHistoryConfig =
            serde_json::from_value(json!({"initial_entry": "/start"})).unwrap();
        assert_eq!(config.initial_entry, "/start");
        assert_eq!(config.max_entries, 1000);
    }
}
