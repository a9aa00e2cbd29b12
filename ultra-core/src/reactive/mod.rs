//! Reactive Primitives
//!
//! This module implements the state core: cells, scoped contexts, stores
//! and effects, plus the cleanup protocol every subscription feeds into.
//!
//! # Concepts
//!
//! ## Cells
//!
//! A [`ReactiveCell`] is a container for mutable state with an explicit
//! subscriber set. Writing a changed value notifies every subscriber
//! synchronously.
//!
//! ## Scoped Contexts
//!
//! A [`ScopedContext`] is a cell whose accessors only work for callers
//! located inside one owner node's subtree.
//!
//! ## Stores
//!
//! A [`Store`] groups named cells with methods that operate on them.
//!
//! ## Effects
//!
//! An [`Effect`] runs an action now and again whenever one of the sources it
//! was given fires.
//!
//! # Implementation Notes
//!
//! Dependencies are explicit. Reading a cell never subscribes anything;
//! callers list the sources they care about. There is no batching: every
//! write fans out before `set` returns.

mod cell;
mod cleanup;
mod context;
mod effect;
mod store;
mod subscriber;

pub use cell::{CellValue, ReactiveCell};
pub use cleanup::{guard, guard_with, Cleanup, Disposable, Teardown};
pub use context::{reachable, Containment, ContextError, ContextValue, ScopedContext, ScopedSource};
pub use effect::{effect, Effect};
pub use store::{Method, Store, StoreError, StoreShape};
pub use subscriber::{Notify, Source, Subscriber, SubscriberId, Unsubscribe};
