//! Core types for the location store.

use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Key carried by the entry a history starts on.
pub const INITIAL_KEY: &str = "initial";

/// A snapshot of the current position in a history source.
///
/// Locations are never mutated once published; every navigation produces
/// a fresh value.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Path component, always starting with `/`.
    pub pathname: String,
    /// Query string including the leading `?`, or empty.
    pub search: String,
    /// Fragment including the leading `#`, or empty.
    pub hash: String,
    /// Arbitrary state attached by the navigation that produced this entry.
    pub state: Option<serde_json::Value>,
    /// Identifies the history entry.
    pub key: String,
}

impl Location {
    /// Parse an absolute href such as `/docs?page=2#intro`.
    pub fn parse(href: &str) -> Result<Self> {
        if !href.starts_with('/') {
            return Err(StoreError::InvalidLocation(format!(
                "expected an absolute path, got {:?}",
                href
            )));
        }

        let (rest, hash) = match href.find('#') {
            Some(at) => (&href[..at], &href[at..]),
            None => (href, ""),
        };
        let (pathname, search) = match rest.find('?') {
            Some(at) => (&rest[..at], &rest[at..]),
            None => (rest, ""),
        };

        Ok(Self {
            pathname: pathname.to_string(),
            search: normalize_part(search),
            hash: normalize_part(hash),
            state: None,
            key: INITIAL_KEY.to_string(),
        })
    }

    /// Attach navigation state.
    pub fn with_state(mut self, state: Option<serde_json::Value>) -> Self {
        self.state = state;
        self
    }

    /// Replace the entry key.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Path, query and fragment joined back together.
    pub fn href(&self) -> String {
        format!("{}{}{}", self.pathname, self.search, self.hash)
    }
}

/// A bare `?` or `#` carries nothing.
fn normalize_part(part: &str) -> String {
    if part.len() <= 1 {
        String::new()
    } else {
        part.to_string()
    }
}

impl fmt::Debug for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Location({} key={})", self.href(), self.key)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.href())
    }
}

/// How a history source arrived at its current entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    /// A new entry was pushed.
    Push,
    /// The current entry was replaced in place.
    Replace,
    /// The cursor moved to an existing entry.
    Pop,
}

/// Notification delivered to history listeners.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEvent {
    pub location: Location,
    pub action: HistoryAction,
}

/// Options for [`crate::MemoryHistory::navigate`].
#[derive(Clone, Debug, Default)]
pub struct NavigateOptions {
    /// State stored on the new entry.
    pub state: Option<serde_json::Value>,
    /// Replace the current entry instead of pushing.
    pub replace: bool,
}

impl NavigateOptions {
    pub fn replace() -> Self {
        Self {
            replace: true,
            ..Default::default()
        }
    }

    pub fn with_state(state: serde_json::Value) -> Self {
        Self {
            state: Some(state),
            ..Default::default()
        }
    }
}
