//! Teardown and Cleanup Aggregation
//!
//! Every subscription, listener and user-supplied teardown created while
//! building a node ends up in one [`Cleanup`]. Running the cleanup runs each
//! entry in registration order. A panicking entry is caught, logged and
//! skipped; the remaining entries still run.
//!
//! # Isolation
//!
//! User callbacks are the only place a failure can originate in this crate,
//! so all of them go through [`guard`]. It wraps the call in
//! `catch_unwind` and reports the panic payload via `tracing::error!`.
//!
//! # Disposable
//!
//! A parent that receives a child node asks it for its cleanup through the
//! [`Disposable`] trait rather than inspecting private state. Whatever the
//! child returns is appended to the parent's list, so teardown propagates
//! bottom-up exactly once.

use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;
use tracing::{debug, error};

use super::subscriber::Unsubscribe;

/// Run a user callback, containing any panic.
///
/// Returns `true` when the callback completed normally.
pub fn guard<F>(what: &str, f: F) -> bool
where
    F: FnOnce(),
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(()) => true,
        Err(payload) => {
            error!(callback = what, reason = %panic_message(&*payload), "callback panicked");
            false
        }
    }
}

/// Like [`guard`] but keeps the callback's return value.
pub fn guard_with<R, F>(what: &str, f: F) -> Option<R>
where
    F: FnOnce() -> R,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Some(value),
        Err(payload) => {
            error!(callback = what, reason = %panic_message(&*payload), "callback panicked");
            None
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}

/// A single deferred teardown action.
pub struct Teardown(Box<dyn FnOnce() + Send>);

impl Teardown {
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self(Box::new(f))
    }

    /// Run the teardown, isolating a panic.
    pub fn run(self) -> bool {
        guard("teardown", self.0)
    }
}

impl fmt::Debug for Teardown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Teardown")
    }
}

impl From<Unsubscribe> for Teardown {
    fn from(handle: Unsubscribe) -> Self {
        Teardown::new(move || handle.call())
    }
}

impl From<Cleanup> for Teardown {
    fn from(cleanup: Cleanup) -> Self {
        Teardown::new(move || {
            cleanup.run();
        })
    }
}

struct CleanupState {
    entries: SmallVec<[Teardown; 4]>,
    ran: bool,
}

/// Aggregate cleanup owned by a node.
///
/// Clones share state; the aggregate runs at most once no matter how many
/// clones call [`Cleanup::run`].
#[derive(Clone)]
pub struct Cleanup {
    state: Arc<Mutex<CleanupState>>,
}

impl Cleanup {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(CleanupState {
                entries: SmallVec::new(),
                ran: false,
            })),
        }
    }

    /// Register a teardown.
    ///
    /// Anything registered after the aggregate already ran is executed
    /// immediately, so late subscriptions cannot leak.
    pub fn push(&self, teardown: impl Into<Teardown>) {
        let teardown = teardown.into();
        let mut state = self.state.lock();
        if state.ran {
            drop(state);
            debug!("cleanup already ran; running late teardown now");
            teardown.run();
        } else {
            state.entries.push(teardown);
        }
    }

    /// Register a closure as a teardown.
    pub fn add<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.push(Teardown::new(f));
    }

    /// Number of pending teardowns.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether [`Cleanup::run`] has been called.
    pub fn has_run(&self) -> bool {
        self.state.lock().ran
    }

    /// Run every teardown in registration order.
    ///
    /// Returns the number of entries that panicked. Only the first call does
    /// any work.
    pub fn run(&self) -> usize {
        let entries = {
            let mut state = self.state.lock();
            if state.ran {
                debug!("cleanup invoked more than once; ignoring");
                return 0;
            }
            state.ran = true;
            std::mem::take(&mut state.entries)
        };

        let total = entries.len();
        let failed = entries
            .into_iter()
            .map(Teardown::run)
            .filter(|ok| !ok)
            .count();
        debug!(total, failed, "cleanup ran");
        failed
    }
}

impl Default for Cleanup {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Cleanup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Cleanup")
            .field("pending", &state.entries.len())
            .field("ran", &state.ran)
            .finish()
    }
}

/// Optional capability: something that owns an aggregate cleanup.
pub trait Disposable {
    /// The owned cleanup, if any.
    fn cleanup(&self) -> Option<Cleanup>;

    /// Run the owned cleanup, if any.
    fn dispose(&self) {
        if let Some(cleanup) = self.cleanup() {
            cleanup.run();
        }
    }
}

impl Disposable for Cleanup {
    fn cleanup(&self) -> Option<Cleanup> {
        Some(self.clone())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
