//! Scoped Context
//!
//! A `ScopedContext` is a [`ReactiveCell`] whose accessors are gated by
//! position in a containment tree. Once an owner node is assigned, only
//! callers that pass a candidate inside the owner's subtree (owner included)
//! can read, write or subscribe. Before an owner is assigned everything is
//! reachable.
//!
//! # Gating
//!
//! | call        | reachable          | unreachable                   |
//! |-------------|--------------------|-------------------------------|
//! | `get`       | `Value(v)`         | `ContextValue::Undefined`     |
//! | `set`       | writes, notifies   | dropped                       |
//! | `subscribe` | registers          | no-op handle, never fires     |
//!
//! Reachability is evaluated on every call against the live tree, so
//! moving a node in or out of the owner's subtree changes the answer
//! immediately.
//!
//! The policy itself is the free function [`reachable`], which takes the
//! containment test as a parameter and can be exercised against any tree.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;
use tracing::debug;

use super::cell::{CellValue, ReactiveCell};
use super::subscriber::{Notify, Source, Unsubscribe};
use crate::dom::Node;

/// A node type that can answer "is `other` inside me?".
pub trait Containment: Clone + Send + Sync + 'static {
    /// True if `self` is `other` or one of its ancestors.
    fn contains(&self, other: &Self) -> bool;

    /// Short human-readable label used in error messages.
    fn describe(&self) -> String;
}

/// Decide whether `candidate` may access a context owned by `owner`.
///
/// - no owner: always reachable
/// - owner but no candidate: unreachable
/// - otherwise: `contains(owner, candidate)`
pub fn reachable<N, F>(owner: Option<&N>, candidate: Option<&N>, contains: F) -> bool
where
    F: Fn(&N, &N) -> bool,
{
    match (owner, candidate) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(owner), Some(candidate)) => contains(owner, candidate),
    }
}

/// Errors raised by context ownership.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContextError {
    #[error("context `{name}` is already owned by {owner}")]
    AlreadyOwned { name: String, owner: String },
}

/// Result of a gated read.
///
/// `Undefined` is what an out-of-scope caller sees. It is a real value, not
/// an absent one, so it can be stored, compared and printed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextValue<T> {
    Value(T),
    Undefined,
}

impl<T> ContextValue<T> {
    pub fn is_undefined(&self) -> bool {
        matches!(self, ContextValue::Undefined)
    }

    /// Convert into an `Option`, mapping `Undefined` to `None`.
    pub fn value(self) -> Option<T> {
        match self {
            ContextValue::Value(v) => Some(v),
            ContextValue::Undefined => None,
        }
    }

    pub fn unwrap_or(self, default: T) -> T {
        self.value().unwrap_or(default)
    }
}

impl<T: fmt::Display> fmt::Display for ContextValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextValue::Value(v) => fmt::Display::fmt(v, f),
            ContextValue::Undefined => f.write_str("undefined"),
        }
    }
}

/// A reactive value scoped to a subtree.
///
/// # Example
///
/// ```rust
/// use ultra_core::dom::Node;
/// use ultra_core::reactive::{ContextValue, ScopedContext};
///
/// let theme = ScopedContext::<&str>::new("theme", "light");
/// let root = Node::element("main");
/// let inside = Node::element("p");
/// root.append_child(&inside).unwrap();
/// let outside = Node::element("aside");
///
/// theme.own(&root).unwrap();
/// assert_eq!(theme.get(Some(&inside)), ContextValue::Value("light"));
/// assert!(theme.get(Some(&outside)).is_undefined());
/// ```
pub struct ScopedContext<T: CellValue, N: Containment = Node> {
    /// Display name used in diagnostics.
    name: Arc<str>,

    /// Underlying state.
    cell: ReactiveCell<T>,

    /// Ownership boundary. Assigned at most once.
    owner: Arc<RwLock<Option<N>>>,
}

impl<T: CellValue, N: Containment> ScopedContext<T, N> {
    /// Create an unowned context.
    pub fn new(name: impl Into<Arc<str>>, value: T) -> Self {
        Self {
            name: name.into(),
            cell: ReactiveCell::new(value),
            owner: Arc::new(RwLock::new(None)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Assign the ownership boundary.
    ///
    /// Fails if an owner is already set; the existing owner is kept.
    pub fn own(&self, node: &N) -> Result<(), ContextError> {
        let mut owner = self.owner.write();
        if let Some(existing) = owner.as_ref() {
            return Err(ContextError::AlreadyOwned {
                name: self.name.to_string(),
                owner: existing.describe(),
            });
        }
        debug!(context = %self.name, owner = %node.describe(), "context owned");
        *owner = Some(node.clone());
        Ok(())
    }

    /// The current owner, if any.
    pub fn owner(&self) -> Option<N> {
        self.owner.read().clone()
    }

    pub fn is_owned(&self) -> bool {
        self.owner.read().is_some()
    }

    /// Whether `candidate` may access this context right now.
    pub fn allows(&self, candidate: Option<&N>) -> bool {
        // Clone out so the containment walk runs without our lock held.
        let owner = self.owner.read().clone();
        reachable(owner.as_ref(), candidate, |o, c| o.contains(c))
    }

    /// Gated read.
    pub fn get(&self, candidate: Option<&N>) -> ContextValue<T> {
        if self.allows(candidate) {
            ContextValue::Value(self.cell.get())
        } else {
            debug!(context = %self.name, "read from outside scope");
            ContextValue::Undefined
        }
    }

    /// Gated write. Returns `true` if subscribers were notified.
    pub fn set(&self, value: T, candidate: Option<&N>) -> bool {
        if self.allows(candidate) {
            self.cell.set(value)
        } else {
            debug!(context = %self.name, "write from outside scope dropped");
            false
        }
    }

    /// Gated subscription.
    pub fn subscribe<F>(&self, notify: F, candidate: Option<&N>) -> Unsubscribe
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        if self.allows(candidate) {
            self.cell.subscribe(notify)
        } else {
            debug!(context = %self.name, "subscription from outside scope ignored");
            Unsubscribe::noop()
        }
    }

    /// A [`Source`] that subscribes on behalf of `candidate`.
    pub fn source(&self, candidate: Option<N>) -> ScopedSource<T, N> {
        ScopedSource {
            context: self.clone(),
            candidate,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.cell.subscriber_count()
    }
}

impl<T: CellValue, N: Containment> Clone for ScopedContext<T, N> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            cell: self.cell.clone(),
            owner: Arc::clone(&self.owner),
        }
    }
}

impl<T: CellValue + fmt::Debug, N: Containment> fmt::Debug for ScopedContext<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedContext")
            .field("name", &self.name)
            .field("owner", &self.owner.read().as_ref().map(N::describe))
            .field("cell", &self.cell)
            .finish()
    }
}

/// A context bound to one candidate node, usable as a trigger or effect source.
pub struct ScopedSource<T: CellValue, N: Containment = Node> {
    context: ScopedContext<T, N>,
    candidate: Option<N>,
}

impl<T: CellValue, N: Containment> Source for ScopedSource<T, N> {
    fn watch(&self, notify: Notify) -> Unsubscribe {
        self.context
            .subscribe(move |_| notify(), self.candidate.as_ref())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
