//! Router
//!
//! Matches the current location against an ordered route table and renders
//! the matched component into a container.
//!
//! # State Machine
//!
//! ```text
//! Idle --render--> Rendered(path, cleanup) --navigate--> Rendered(path', cleanup')
//! ```
//!
//! On every navigation the previous render's cleanup runs before the new
//! component is built, so no subscription from the outgoing view observes
//! changes made while the incoming view initializes.
//!
//! Pushes and back/forward traversal both arrive through
//! [`History::listen`](crate::dom::History::listen) and go through the same
//! [`Router::render`].

mod link;
mod matcher;

pub use link::{link, navigate, Link};
pub use matcher::{resolve, Params, RoutePattern};

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexSet;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::component::Child;
use crate::dom::{Document, Node};
use crate::reactive::{guard_with, Cleanup, Disposable, Unsubscribe};

type Factory = Arc<dyn Fn(&Params) -> Child + Send + Sync>;

/// A route table entry.
#[derive(Clone)]
pub struct Route {
    pattern: RoutePattern,
    factory: Factory,
}

impl Route {
    pub fn new<F, C>(path: &str, factory: F) -> Self
    where
        F: Fn(&Params) -> C + Send + Sync + 'static,
        C: Into<Child>,
    {
        Self {
            pattern: RoutePattern::parse(path),
            factory: Arc::new(move |params: &Params| factory(params).into()),
        }
    }

    pub fn pattern(&self) -> &RoutePattern {
        &self.pattern
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route").field("pattern", &self.pattern).finish()
    }
}

/// What the router currently shows.
#[derive(Debug, Clone, Default)]
pub enum RouterState {
    #[default]
    Idle,
    Rendered {
        path: String,
        cleanup: Option<Cleanup>,
    },
}

impl RouterState {
    pub fn path(&self) -> Option<&str> {
        match self {
            RouterState::Idle => None,
            RouterState::Rendered { path, .. } => Some(path),
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, RouterState::Idle)
    }
}

struct RouterInner {
    doc: Document,
    container: Node,
    routes: Vec<Route>,
    state: Mutex<RouterState>,
    listener: Mutex<Option<Unsubscribe>>,
    generation: AtomicU64,
}

// The history listener only holds a `Weak`, so this runs once the last
// `Router` handle goes away even while mounted.
impl Drop for RouterInner {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.get_mut().take() {
            listener.call();
        }
        if let RouterState::Rendered {
            cleanup: Some(cleanup),
            ..
        } = std::mem::take(self.state.get_mut())
        {
            debug!("router dropped while rendered");
            cleanup.run();
            self.container.clear_children();
        }
    }
}

/// SPA router bound to one container node.
#[derive(Clone)]
pub struct Router {
    inner: Arc<RouterInner>,
}

impl Router {
    /// Duplicate non-wildcard paths are logged and kept; the earlier entry
    /// shadows the later one.
    pub fn new(doc: &Document, container: &Node, routes: Vec<Route>) -> Self {
        let mut seen = IndexSet::new();
        for route in &routes {
            let pattern = route.pattern();
            if !pattern.is_wildcard() && !seen.insert(pattern.as_str()) {
                warn!(path = pattern.as_str(), "duplicate route path");
            }
        }

        Self {
            inner: Arc::new(RouterInner {
                doc: doc.clone(),
                container: container.clone(),
                routes,
                state: Mutex::new(RouterState::Idle),
                listener: Mutex::new(None),
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn routes(&self) -> &[Route] {
        &self.inner.routes
    }

    /// The route `path` resolves to, with its bound parameters.
    pub fn resolve(&self, path: &str) -> Option<(&Route, Params)> {
        let routes = &self.inner.routes;
        resolve(routes.iter().map(Route::pattern), path)
            .map(|(index, params)| (&routes[index], params))
    }

    /// Start following navigation and render the current location.
    ///
    /// Mounting twice keeps a single listener.
    pub fn mount(&self) {
        {
            let mut listener = self.inner.listener.lock();
            if listener.is_none() {
                let weak: Weak<RouterInner> = Arc::downgrade(&self.inner);
                *listener = Some(self.inner.doc.history().listen(move |kind| {
                    if let Some(inner) = weak.upgrade() {
                        debug!(?kind, "navigation");
                        Router { inner }.render();
                    }
                }));
            }
        }
        self.render();
    }

    /// Stop following navigation, tear down the current view and clear the
    /// container.
    pub fn unmount(&self) {
        if let Some(listener) = self.inner.listener.lock().take() {
            listener.call();
        }
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        let previous = std::mem::take(&mut *self.inner.state.lock());
        if let RouterState::Rendered {
            cleanup: Some(cleanup),
            ..
        } = previous
        {
            cleanup.run();
        }
        self.inner.container.clear_children();
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.listener.lock().is_some()
    }

    /// Resolve the current location and render it.
    ///
    /// Returns `false` if no route matched; the container is then emptied
    /// and the router goes back to `Idle`.
    pub fn render(&self) -> bool {
        let inner = &self.inner;
        let generation = inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let path = inner.doc.location().path().to_string();

        let previous = std::mem::take(&mut *inner.state.lock());
        if let RouterState::Rendered {
            path: old,
            cleanup: Some(cleanup),
        } = previous
        {
            debug!(from = %old, to = %path, "tearing down previous view");
            cleanup.run();
        }

        let Some((route, params)) = self.resolve(&path) else {
            warn!(path = %path, "no route matched");
            inner.container.clear_children();
            return false;
        };

        let node = match guard_with("route factory", || (route.factory)(&params)) {
            Some(child) => child.into_node(&inner.doc),
            None => inner.doc.placeholder(),
        };
        let cleanup = node.cleanup();

        // The factory may have navigated; a newer render owns the container.
        if inner.generation.load(Ordering::SeqCst) != generation {
            debug!(path = %path, "render superseded");
            if let Some(cleanup) = cleanup {
                cleanup.run();
            }
            return true;
        }

        if let Err(err) = inner.container.replace_children(&node) {
            warn!(error = %err, "could not mount route view");
        }
        debug!(path = %path, route = %route.pattern(), "rendered");
        *inner.state.lock() = RouterState::Rendered { path, cleanup };
        true
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> RouterState {
        self.inner.state.lock().clone()
    }

    pub fn current_path(&self) -> Option<String> {
        self.inner.state.lock().path().map(str::to_string)
    }

    pub fn container(&self) -> &Node {
        &self.inner.container
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.inner.routes)
            .field("state", &*self.inner.state.lock())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
