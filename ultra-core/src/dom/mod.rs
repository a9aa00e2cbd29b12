//! Document Model
//!
//! This module is the platform layer the toolkit renders into: an in-memory
//! node tree with events, a markup parser, scoped styles, session history and
//! a frame queue for deferred work.
//!
//! # Overview
//!
//! - [`Node`] is a shared handle to an element, text node or fragment.
//!   `a.contains(&b)` is the containment test scoped contexts rely on.
//! - [`Document`] bundles `<head>`, `<body>`, [`History`], [`FrameQueue`],
//!   the [`MarkupParser`] and [`UltraConfig`](crate::UltraConfig).
//! - [`StyleScope`] turns CSS text into scoped class names, injecting each
//!   distinct sheet into the head once.
//!
//! # Design Decisions
//!
//! 1. Nodes use `Arc` + `parking_lot::RwLock` so they can be captured by
//!    subscriber closures, which must be `Send + Sync`.
//!
//! 2. No lock is held while user callbacks (listeners, frame tasks,
//!    navigation listeners) run. Callbacks are free to mutate the tree.
//!
//! 3. Events are delivered to the target node only; there is no bubbling.

mod document;
mod event;
mod history;
mod node;
mod parser;
mod scheduler;
mod style;

pub use document::Document;
pub use event::{Event, ListenerId, Modifiers};
pub use history::{History, Location, NavigationKind};
pub use node::{DomError, Handler, Node, NodeId, NodeKind, WeakNode, VOID_ELEMENTS};
pub use parser::{HtmlParser, MarkupParser};
pub use scheduler::{FrameQueue, Lane};
pub use style::{stable_hash, ClassMap, StyleScope};
