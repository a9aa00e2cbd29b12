//! Components
//!
//! Builders that turn a markup string plus declarative specs into a live
//! [`Node`] whose subscriptions are owned by one aggregate cleanup.
//!
//! # How Building Works
//!
//! 1. The markup is parsed into exactly one root. If parsing fails, an empty
//!    placeholder takes its place and a warning is logged.
//!
//! 2. Listeners, inline styles and classes are applied to the root. Each
//!    listener adds one teardown to the root's cleanup.
//!
//! 3. Children are appended. A child that is [`Disposable`] contributes its
//!    own cleanup, so teardown propagates bottom-up exactly once per node.
//!
//! 4. Triggers subscribe to their sources. Deferred triggers dispatch on the
//!    next-frame lane.
//!
//! 5. Post-mount callbacks are queued for the next frame.
//!
//! Whoever displaces the node from the document runs its cleanup, usually
//! the router or a parent component being torn down.
//!
//! [`Disposable`]: crate::reactive::Disposable

mod activity;
mod builder;

pub use activity::{ActivityType, UltraActivity};
pub use builder::{Trigger, UltraComponent};

use tracing::warn;

use crate::dom::{Document, Node};

/// Something that can be appended as a child: markup or a built node.
#[derive(Debug, Clone)]
pub enum Child {
    Markup(String),
    Node(Node),
}

impl Child {
    /// Resolve to a node, substituting a placeholder if markup fails to parse.
    pub fn into_node(self, doc: &Document) -> Node {
        match self {
            Child::Node(node) => node,
            Child::Markup(markup) => doc.parse(&markup).unwrap_or_else(|| {
                warn!(markup = %markup, "could not parse child markup; using placeholder");
                doc.placeholder()
            }),
        }
    }
}

impl From<&str> for Child {
    fn from(markup: &str) -> Self {
        Child::Markup(markup.to_string())
    }
}

impl From<String> for Child {
    fn from(markup: String) -> Self {
        Child::Markup(markup)
    }
}

impl From<Node> for Child {
    fn from(node: Node) -> Self {
        Child::Node(node)
    }
}

impl From<&Node> for Child {
    fn from(node: &Node) -> Self {
        Child::Node(node.clone())
    }
}
