//! Reactive Cell
//!
//! A `ReactiveCell` holds one value and a set of subscribers. Writing a new
//! value notifies every subscriber synchronously, before `set` returns.
//!
//! # Change Detection
//!
//! Whether a write counts as a change is decided by [`CellValue::same`]:
//!
//! - Value-like types (numbers, strings, bools, `Option` of those) compare
//!   by equality. Writing an equal value is skipped.
//! - `Arc<T>` compares by pointer identity. A fresh `Arc` with identical
//!   contents is a change.
//! - Collections and JSON arrays/objects never compare equal, so every
//!   write notifies. Callers who want structural dedup must do it
//!   themselves.
//!
//! # Firing
//!
//! Subscribers are snapshotted before firing. A subscriber that removes
//! itself (or another) mid-pass does not disturb the current pass, and
//! additions made during a pass are first seen by the next one. Each
//! subscriber runs under [`guard`], so one panic does not stop the rest.
//!
//! # Memory Layout
//!
//! Each cell consists of:
//! - A unique ID (8 bytes)
//! - The value, behind `Arc<RwLock<_>>` so clones share it
//! - The subscriber list, also shared

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use parking_lot::RwLock;
use smallvec::SmallVec;
use tracing::trace;

use super::cleanup::guard;
use super::subscriber::{Notify, Source, Subscriber, Unsubscribe};

/// Counter for generating unique cell IDs.
static CELL_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a new unique cell ID.
fn next_cell_id() -> u64 {
    CELL_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Values that can live in a [`ReactiveCell`].
///
/// `same` answers "would writing `other` over `self` be a no-op?".
pub trait CellValue: Clone + Send + Sync + 'static {
    fn same(&self, other: &Self) -> bool;
}

macro_rules! value_like {
    ($($t:ty),* $(,)?) => {
        $(
            impl CellValue for $t {
                fn same(&self, other: &Self) -> bool {
                    self == other
                }
            }
        )*
    };
}

value_like!(
    (), bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64,
    String, &'static str,
);

impl<T: CellValue> CellValue for Option<T> {
    fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Some(a), Some(b)) => a.same(b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T: ?Sized + Send + Sync + 'static> CellValue for Arc<T> {
    fn same(&self, other: &Self) -> bool {
        Arc::ptr_eq(self, other)
    }
}

impl<T: Clone + Send + Sync + 'static> CellValue for Vec<T> {
    fn same(&self, _other: &Self) -> bool {
        false
    }
}

impl<K, V> CellValue for IndexMap<K, V>
where
    K: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn same(&self, _other: &Self) -> bool {
        false
    }
}

impl<K, V> CellValue for HashMap<K, V>
where
    K: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn same(&self, _other: &Self) -> bool {
        false
    }
}

impl<T: Clone + Send + Sync + 'static> CellValue for IndexSet<T> {
    fn same(&self, _other: &Self) -> bool {
        false
    }
}

impl CellValue for serde_json::Value {
    fn same(&self, other: &Self) -> bool {
        use serde_json::Value;
        match (self, other) {
            (Value::Array(_), _) | (Value::Object(_), _) => false,
            (a, b) => a == b,
        }
    }
}

/// A mutable value with a change-subscriber set.
///
/// # Example
///
/// ```rust
/// use ultra_core::reactive::ReactiveCell;
///
/// let count = ReactiveCell::new(0);
/// let _sub = count.subscribe(|v| println!("count is now {v}"));
///
/// count.set(1); // prints
/// count.set(1); // equal value, skipped
/// ```
pub struct ReactiveCell<T: CellValue> {
    /// Unique identifier for this cell.
    id: u64,

    /// The current value.
    value: Arc<RwLock<T>>,

    /// Registered subscribers, in registration order.
    subscribers: Arc<RwLock<Vec<Subscriber<T>>>>,
}

impl<T: CellValue> ReactiveCell<T> {
    /// Create a new cell with the given initial value.
    pub fn new(value: T) -> Self {
        Self {
            id: next_cell_id(),
            value: Arc::new(RwLock::new(value)),
            subscribers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Get the cell's unique ID.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Get a clone of the current value.
    pub fn get(&self) -> T {
        self.value.read().clone()
    }

    /// Borrow the current value without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.value.read())
    }

    /// Replace the value and notify subscribers if it changed.
    ///
    /// Returns `true` if subscribers were notified.
    pub fn set(&self, value: T) -> bool {
        {
            let mut guard = self.value.write();
            if guard.same(&value) {
                trace!(cell = self.id, "set skipped: value unchanged");
                return false;
            }
            *guard = value.clone();
        }

        self.notify_subscribers(&value);
        true
    }

    /// Update the value using a function of the current one.
    pub fn update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&T) -> T,
    {
        let new_value = f(&self.value.read());
        self.set(new_value)
    }

    /// Register a subscriber. It fires on every change until unsubscribed.
    pub fn subscribe<F>(&self, notify: F) -> Unsubscribe
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let subscriber = Subscriber::new(notify);
        let id = subscriber.id();
        self.subscribers.write().push(subscriber);

        let subscribers = Arc::downgrade(&self.subscribers);
        Unsubscribe::new(move || {
            if let Some(subscribers) = subscribers.upgrade() {
                subscribers.write().retain(|s| s.id() != id);
            }
        })
    }

    /// Notify all subscribers of `value`.
    fn notify_subscribers(&self, value: &T) {
        let snapshot: SmallVec<[Subscriber<T>; 8]> =
            self.subscribers.read().iter().cloned().collect();
        trace!(cell = self.id, subscribers = snapshot.len(), "notifying");

        for subscriber in snapshot {
            guard("cell subscriber", || subscriber.notify(value));
        }
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

impl<T: CellValue> Clone for ReactiveCell<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            value: Arc::clone(&self.value),
            subscribers: Arc::clone(&self.subscribers),
        }
    }
}

impl<T: CellValue> Source for ReactiveCell<T> {
    fn watch(&self, notify: Notify) -> Unsubscribe {
        self.subscribe(move |_| notify())
    }
}

impl<T> Debug for ReactiveCell<T>
where
    T: CellValue + Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReactiveCell")
            .field("id", &self.id)
            .field("value", &*self.value.read())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicI32, Ordering};

    fn counting<T: CellValue>(cell: &ReactiveCell<T>) -> (Arc<AtomicI32>, Unsubscribe) {
        let calls = Arc::new(AtomicI32::new(0));
        let calls_clone = calls.clone();
        let handle = cell.subscribe(move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });
        (calls, handle)
    }

    #[test]
    fn cell_get_and_set() {
        let cell = ReactiveCell::new(0);
        assert_eq!(cell.get(), 0);

        cell.set(42);
        assert_eq!(cell.get(), 42);
    }

    #[test]
    fn cell_update() {
        let cell = ReactiveCell::new(10);
        cell.update(|v| v + 5);
        assert_eq!(cell.get(), 15);
    }

    #[test]
    fn equal_primitive_is_skipped() {
        let cell = ReactiveCell::new(0);
        let (calls, _handle) = counting(&cell);

        assert!(cell.set(1));
        assert!(!cell.set(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn subscriber_receives_new_value() {
        let cell = ReactiveCell::new(String::from("a"));
        let seen = Arc::new(RwLock::new(String::new()));
        let seen_clone = seen.clone();
        let _handle = cell.subscribe(move |v: &String| *seen_clone.write() = v.clone());

        cell.set("b".to_string());
        assert_eq!(*seen.read(), "b");
    }

    #[test]
    fn fresh_arc_always_notifies() {
        let cell = ReactiveCell::new(Arc::new(vec![1, 2, 3]));
        let (calls, _handle) = counting(&cell);

        let same_contents = Arc::new((*cell.get()).clone());
        cell.set(same_contents);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Writing back the very same Arc is not a change.
        cell.set(cell.get());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn json_objects_always_notify() {
        let cell = ReactiveCell::new(json!({ "theme": "dark" }));
        let (calls, _handle) = counting(&cell);

        cell.set(json!({ "theme": "dark" }));
        cell.set(json!({ "theme": "dark" }));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let scalar = ReactiveCell::new(json!(1));
        let (scalar_calls, _h) = counting(&scalar);
        scalar.set(json!(1));
        assert_eq!(scalar_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unsubscribe_stops_notifications() {
        let cell = ReactiveCell::new(0);
        let (calls, handle) = counting(&cell);

        cell.set(1);
        handle.call();
        handle.call();
        cell.set(2);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cell.subscriber_count(), 0);
    }

    #[test]
    fn duplicate_registration_fires_twice() {
        let cell = ReactiveCell::new(0);
        let calls = Arc::new(AtomicI32::new(0));
        let callback = {
            let calls = calls.clone();
            Arc::new(move |_: &i32| {
                calls.fetch_add(1, Ordering::SeqCst);
            })
        };

        let a = callback.clone();
        let b = callback.clone();
        let _h1 = cell.subscribe(move |v| a(v));
        let _h2 = cell.subscribe(move |v| b(v));

        cell.set(1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn panicking_subscriber_does_not_block_others() {
        let cell = ReactiveCell::new(0);
        let _bad = cell.subscribe(|_| panic!("subscriber failure"));
        let (calls, _handle) = counting(&cell);

        cell.set(1);
        cell.set(2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn self_removal_during_firing_is_safe() {
        let cell = ReactiveCell::new(0);
        let slot: Arc<RwLock<Option<Unsubscribe>>> = Arc::new(RwLock::new(None));
        let calls = Arc::new(AtomicI32::new(0));

        let handle = {
            let slot = slot.clone();
            let calls = calls.clone();
            cell.subscribe(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                if let Some(handle) = slot.read().as_ref() {
                    handle.call();
                }
            })
        };
        *slot.write() = Some(handle);
        let (others, _h) = counting(&cell);

        cell.set(1);
        cell.set(2);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(others.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn subscriber_added_mid_pass_waits_for_next_write() {
        let cell = ReactiveCell::new(0);
        let late_calls = Arc::new(AtomicI32::new(0));
        let late_handles: Arc<RwLock<Vec<Unsubscribe>>> = Arc::new(RwLock::new(Vec::new()));

        let _outer = {
            let target = cell.clone();
            let late_calls = late_calls.clone();
            let late_handles = late_handles.clone();
            cell.subscribe(move |_| {
                if !late_handles.read().is_empty() {
                    return;
                }
                let late_calls = late_calls.clone();
                let handle = target.subscribe(move |_| {
                    late_calls.fetch_add(1, Ordering::SeqCst);
                });
                late_handles.write().push(handle);
            })
        };

        cell.set(1);
        assert_eq!(late_calls.load(Ordering::SeqCst), 0);
        assert_eq!(cell.subscriber_count(), 2);

        cell.set(2);
        assert_eq!(late_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn subscriber_may_write_back_to_cell() {
        let cell = ReactiveCell::new(0);
        let inner = cell.clone();
        let _handle = cell.subscribe(move |v| {
            if *v < 3 {
                inner.set(v + 1);
            }
        });

        cell.set(1);
        assert_eq!(cell.get(), 3);
    }

    #[test]
    fn cell_clone_shares_state() {
        let cell1 = ReactiveCell::new(0);
        let cell2 = cell1.clone();

        cell1.set(42);
        assert_eq!(cell2.get(), 42);
        assert_eq!(cell1.id(), cell2.id());
    }

    #[test]
    fn cell_ids_are_unique() {
        let c1 = ReactiveCell::new(0);
        let c2 = ReactiveCell::new(0);
        assert_ne!(c1.id(), c2.id());
    }
}
