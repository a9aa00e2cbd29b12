//! Subscriber types for the reactive system.
//!
//! A Subscriber is a callback registered on a reactive value. Registration
//! hands back an [`Unsubscribe`] handle that removes it again.
//!
//! Anything a trigger or effect can listen to implements [`Source`], which
//! erases the value type and only reports "something changed".

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// Unique identifier for a subscriber.
///
/// Each registration gets a fresh ID, so registering the same closure twice
/// yields two independent entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// A value-carrying subscriber.
///
/// Cloning is cheap: the callback lives behind an `Arc`, which lets a cell
/// snapshot its subscriber list before firing.
pub struct Subscriber<T> {
    id: SubscriberId,
    notify: Arc<dyn Fn(&T) + Send + Sync>,
}

impl<T> Subscriber<T> {
    /// Create a new subscriber with the given notification callback.
    pub fn new<F>(notify: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        Self {
            id: SubscriberId::new(),
            notify: Arc::new(notify),
        }
    }

    /// Get the subscriber's unique ID.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Invoke the callback with the new value.
    pub fn notify(&self, value: &T) {
        (self.notify)(value);
    }
}

impl<T> Clone for Subscriber<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            notify: Arc::clone(&self.notify),
        }
    }
}

/// Type-erased change callback used by [`Source`].
pub type Notify = Arc<dyn Fn() + Send + Sync>;

/// Anything that can report changes to a watcher.
pub trait Source: Send + Sync {
    /// Register `notify` to be called on every change.
    fn watch(&self, notify: Notify) -> Unsubscribe;
}

impl<S: Source + ?Sized> Source for Arc<S> {
    fn watch(&self, notify: Notify) -> Unsubscribe {
        (**self).watch(notify)
    }
}

impl<S: Source + ?Sized> Source for Box<S> {
    fn watch(&self, notify: Notify) -> Unsubscribe {
        (**self).watch(notify)
    }
}

/// Handle that removes a subscription.
///
/// Calling it more than once is a no-op after the first call. Clones share
/// the same underlying removal, so any clone can cancel.
#[derive(Clone)]
pub struct Unsubscribe {
    remove: Arc<Mutex<Option<Box<dyn FnOnce() + Send>>>>,
}

impl Unsubscribe {
    /// Wrap a removal closure.
    pub fn new<F>(remove: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            remove: Arc::new(Mutex::new(Some(Box::new(remove)))),
        }
    }

    /// A handle that does nothing. Returned for gated-out subscriptions.
    pub fn noop() -> Self {
        Self {
            remove: Arc::new(Mutex::new(None)),
        }
    }

    /// Remove the subscription.
    pub fn call(&self) {
        // Take first so the lock is released before the closure runs.
        let remove = self.remove.lock().take();
        if let Some(remove) = remove {
            remove();
        }
    }

    /// Whether the subscription is still registered through this handle.
    pub fn is_active(&self) -> bool {
        self.remove.lock().is_some()
    }
}

impl fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unsubscribe")
            .field("active", &self.is_active())
            .finish()
    }
}
