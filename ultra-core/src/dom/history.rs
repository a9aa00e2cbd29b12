//! Location and History
//!
//! [`History`] models the browser session history: a list of entries with
//! a cursor. `push` adds an entry (dropping any forward entries) and then
//! announces a [`NavigationKind::Push`]; `back` and `forward` move the
//! cursor and announce a [`NavigationKind::PopState`]. Listeners receive
//! both kinds through the same registration.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::debug;
use url::form_urlencoded;

use crate::reactive::{guard, SubscriberId, Unsubscribe};

/// Path and query of the current entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    path: String,
    search: String,
}

impl Location {
    /// Parse a same-origin URL such as `/user/42?tab=posts#top`.
    ///
    /// The fragment is dropped; an empty path becomes `/`.
    pub fn parse(url: &str) -> Self {
        let url = url.split('#').next().unwrap_or_default();
        let (path, search) = match url.split_once('?') {
            Some((path, search)) => (path, search),
            None => (url, ""),
        };
        let path = if path.is_empty() {
            "/".to_string()
        } else if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        Self {
            path,
            search: search.to_string(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Query string without the leading `?`.
    pub fn search(&self) -> &str {
        &self.search
    }

    /// Decoded query parameters in order of appearance. Later duplicates win.
    pub fn query(&self) -> IndexMap<String, String> {
        form_urlencoded::parse(self.search.as_bytes())
            .into_owned()
            .collect()
    }

    pub fn href(&self) -> String {
        if self.search.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, self.search)
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.href())
    }
}

/// Why the location changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationKind {
    /// Programmatic navigation via `push`.
    Push,
    /// Back/forward traversal.
    PopState,
}

type Listener = Arc<dyn Fn(NavigationKind) + Send + Sync>;

struct Entries {
    stack: Vec<Location>,
    index: usize,
}

/// Session history for one document.
#[derive(Clone)]
pub struct History {
    entries: Arc<RwLock<Entries>>,
    listeners: Arc<RwLock<Vec<(SubscriberId, Listener)>>>,
}

impl History {
    pub fn new(initial: &str) -> Self {
        Self {
            entries: Arc::new(RwLock::new(Entries {
                stack: vec![Location::parse(initial)],
                index: 0,
            })),
            listeners: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn location(&self) -> Location {
        let entries = self.entries.read();
        entries.stack[entries.index].clone()
    }

    /// Add an entry without reloading, then announce it.
    pub fn push(&self, url: &str) {
        let location = Location::parse(url);
        {
            let mut entries = self.entries.write();
            let keep = entries.index + 1;
            entries.stack.truncate(keep);
            entries.stack.push(location.clone());
            entries.index = keep;
        }
        debug!(to = %location, "history push");
        self.announce(NavigationKind::Push);
    }

    /// Step back one entry. Returns `false` at the start of history.
    pub fn back(&self) -> bool {
        self.traverse(-1)
    }

    /// Step forward one entry. Returns `false` at the end of history.
    pub fn forward(&self) -> bool {
        self.traverse(1)
    }

    fn traverse(&self, delta: isize) -> bool {
        {
            let mut entries = self.entries.write();
            let target = entries.index as isize + delta;
            if target < 0 || target as usize >= entries.stack.len() {
                return false;
            }
            entries.index = target as usize;
        }
        debug!(to = %self.location(), "history traverse");
        self.announce(NavigationKind::PopState);
        true
    }

    /// Number of entries in the session.
    pub fn len(&self) -> usize {
        self.entries.read().stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Listen for both push and pop-state navigation.
    pub fn listen<F>(&self, listener: F) -> Unsubscribe
    where
        F: Fn(NavigationKind) + Send + Sync + 'static,
    {
        let id = SubscriberId::new();
        self.listeners.write().push((id, Arc::new(listener)));
        let listeners = Arc::downgrade(&self.listeners);
        Unsubscribe::new(move || {
            if let Some(listeners) = listeners.upgrade() {
                listeners.write().retain(|(lid, _)| *lid != id);
            }
        })
    }

    fn announce(&self, kind: NavigationKind) {
        let snapshot: Vec<Listener> = self
            .listeners
            .read()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in snapshot {
            guard("navigation listener", || listener(kind));
        }
    }
}

impl fmt::Debug for History {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("History")
            .field("location", &self.location())
            .field("len", &self.len())
            .finish()
    }
}
