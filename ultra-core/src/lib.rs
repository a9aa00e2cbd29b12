//! Ultra Core
//!
//! This crate provides the core of the Ultra client-side UI toolkit.
//! It implements:
//!
//! - Reactive primitives (cells, scoped contexts, stores, effects)
//! - Component builders that wire subscriptions to DOM mutations
//! - An SPA router with navigation links
//! - An in-memory document model to render into
//!
//! Subscriptions are explicit: nothing is tracked from reads. Every node a
//! builder produces owns one aggregate cleanup holding all of its
//! subscriptions, and whoever removes the node runs it.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: cells, contexts, stores, effects and cleanup plumbing
//! - `dom`: nodes, events, parser, scoped styles, history, frame queue
//! - `component`: `UltraComponent` and `UltraActivity`
//! - `router`: route matching, `Router` and `Link`
//! - `config`: `UltraConfig`
//!
//! # Example
//!
//! ```rust
//! use ultra_core::component::{Trigger, UltraComponent};
//! use ultra_core::dom::Document;
//! use ultra_core::reactive::ReactiveCell;
//!
//! let doc = Document::new("/");
//! let name = ReactiveCell::new(String::from("world"));
//!
//! let n = name.clone();
//! let greeting = UltraComponent::new("<h1>hello</h1>")
//!     .trigger(Trigger::new(name.clone(), move |node| {
//!         node.set_text(&format!("hello {}", n.get()))
//!     }))
//!     .build(&doc);
//! doc.body().append_child(&greeting).unwrap();
//!
//! name.set("ultra".to_string());
//! assert_eq!(greeting.text_content(), "hello ultra");
//! ```

pub mod component;
pub mod config;
pub mod dom;
pub mod reactive;
pub mod router;

pub use component::{Child, Trigger, UltraActivity, UltraComponent};
pub use config::{ConfigError, UltraConfig};
pub use dom::{Document, Node};
pub use reactive::{effect, Cleanup, Disposable, ReactiveCell, ScopedContext, Store};
pub use router::{link, navigate, Link, Route, Router};
