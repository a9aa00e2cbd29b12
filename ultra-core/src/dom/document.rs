//! Document
//!
//! The platform surface everything else is built against: the `<head>` and
//! `<body>` nodes, the frame queue, session history, the markup parser, the
//! configuration and the view-transition capability.
//!
//! `Document` is a cheap handle; clones share everything.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::debug;

use super::history::{History, Location};
use super::node::Node;
use super::parser::{HtmlParser, MarkupParser};
use super::scheduler::FrameQueue;
use crate::config::UltraConfig;

struct DocumentInner {
    root: Node,
    head: Node,
    body: Node,
    frames: FrameQueue,
    history: History,
    parser: Arc<dyn MarkupParser>,
    config: UltraConfig,
    view_transitions: AtomicBool,
    transitions_started: AtomicUsize,
}

/// A document and its platform services.
#[derive(Clone)]
pub struct Document {
    inner: Arc<DocumentInner>,
}

impl Document {
    /// A document at `url` with default config and the built-in parser.
    pub fn new(url: &str) -> Self {
        Self::with_parts(url, UltraConfig::default(), Arc::new(HtmlParser))
    }

    pub fn with_config(url: &str, config: UltraConfig) -> Self {
        Self::with_parts(url, config, Arc::new(HtmlParser))
    }

    pub fn with_parts(url: &str, config: UltraConfig, parser: Arc<dyn MarkupParser>) -> Self {
        let root = Node::element("html");
        let head = Node::element("head");
        let body = Node::element("body");
        // Fresh nodes: neither append can fail.
        let _ = root.append_child(&head);
        let _ = root.append_child(&body);

        Self {
            inner: Arc::new(DocumentInner {
                root,
                head,
                body,
                frames: FrameQueue::new(),
                history: History::new(url),
                parser,
                config,
                view_transitions: AtomicBool::new(false),
                transitions_started: AtomicUsize::new(0),
            }),
        }
    }

    /// The `<html>` element.
    pub fn root(&self) -> &Node {
        &self.inner.root
    }

    pub fn head(&self) -> &Node {
        &self.inner.head
    }

    pub fn body(&self) -> &Node {
        &self.inner.body
    }

    pub fn frames(&self) -> &FrameQueue {
        &self.inner.frames
    }

    pub fn history(&self) -> &History {
        &self.inner.history
    }

    pub fn location(&self) -> Location {
        self.inner.history.location()
    }

    pub fn config(&self) -> &UltraConfig {
        &self.inner.config
    }

    /// Parse markup with the document's parser.
    pub fn parse(&self, markup: &str) -> Option<Node> {
        self.inner.parser.parse(markup)
    }

    /// Empty element used in place of markup that failed to parse.
    pub fn placeholder(&self) -> Node {
        let node = Node::element(&self.inner.config.placeholder_tag);
        node.set_attribute("data-ultra-placeholder", "");
        node
    }

    /// Declare whether the platform supports view transitions.
    pub fn set_view_transitions_supported(&self, supported: bool) {
        self.inner.view_transitions.store(supported, Ordering::SeqCst);
    }

    pub fn supports_view_transitions(&self) -> bool {
        self.inner.view_transitions.load(Ordering::SeqCst)
    }

    /// Apply `update` inside a view transition if supported, otherwise
    /// directly. Returns whether a transition was used.
    pub fn start_view_transition<F>(&self, update: F) -> bool
    where
        F: FnOnce(),
    {
        if self.supports_view_transitions() {
            self.inner.transitions_started.fetch_add(1, Ordering::SeqCst);
            debug!("view transition started");
            update();
            true
        } else {
            update();
            false
        }
    }

    /// Number of view transitions started.
    pub fn view_transition_count(&self) -> usize {
        self.inner.transitions_started.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("location", &self.location())
            .field("frames", &self.inner.frames)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_layout() {
        let doc = Document::new("/start?x=1");
        assert!(doc.root().contains(doc.body()));
        assert!(doc.root().contains(doc.head()));
        assert!(!doc.body().contains(doc.head()));
        assert_eq!(doc.location().path(), "/start");
    }

    #[test]
    fn placeholder_follows_config() {
        let config = UltraConfig {
            placeholder_tag: "span".into(),
            ..UltraConfig::default()
        };
        let doc = Document::with_config("/", config);
        let placeholder = doc.placeholder();
        assert_eq!(placeholder.tag().as_deref(), Some("span"));
        assert!(placeholder.has_attribute("data-ultra-placeholder"));
    }

    #[test]
    fn view_transition_falls_back() {
        let doc = Document::new("/");
        let mut ran = false;
        assert!(!doc.start_view_transition(|| ran = true));
        assert!(ran);

        doc.set_view_transitions_supported(true);
        assert!(doc.start_view_transition(|| {}));
        assert_eq!(doc.view_transition_count(), 1);
    }
}
