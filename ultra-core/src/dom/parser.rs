//! Markup Parsing
//!
//! The component builder consumes markup through the [`MarkupParser`] trait.
//! [`HtmlParser`] is the built-in implementation. It runs html5ever's
//! fragment algorithm in a `<body>` context and converts the resulting tree
//! into [`Node`]s.
//!
//! Comments, doctypes and processing instructions are dropped. Several
//! top-level nodes are returned wrapped in a fragment.
//!
//! html5ever always recovers, so any parse error it reports (unclosed or
//! mismatched tags, a stray `<`, EOF inside a tag) is treated as malformed
//! and yields `None`, as does input with no nodes.

use html5ever::tendril::TendrilSink;
use html5ever::{local_name, namespace_url, ns, parse_fragment, ParseOpts, QualName};
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use tracing::debug;

use super::node::Node;

/// Turns markup into a single root node.
pub trait MarkupParser: Send + Sync {
    /// Parse `markup`. `None` means malformed or empty.
    fn parse(&self, markup: &str) -> Option<Node>;
}

/// The built-in HTML fragment parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlParser;

impl MarkupParser for HtmlParser {
    fn parse(&self, markup: &str) -> Option<Node> {
        if markup.trim().is_empty() {
            return None;
        }

        let context = QualName::new(None, ns!(html), local_name!("body"));
        let dom = parse_fragment(RcDom::default(), ParseOpts::default(), context, Vec::new())
            .one(markup);
        if let Some(reason) = dom.errors.first() {
            debug!(%reason, errors = dom.errors.len(), "markup rejected");
            return None;
        }

        // Fragment output hangs off a synthetic <html> element.
        let root = Node::fragment();
        let document_children = dom.document.children.borrow();
        for wrapper in document_children.iter() {
            for handle in wrapper.children.borrow().iter() {
                if let Some(child) = convert(handle) {
                    root.append_child(&child).ok()?;
                }
            }
        }

        let mut children = root.children();
        // Whitespace between top-level tags is formatting, not content.
        if children.iter().any(|c| !c.is_text()) {
            for child in &children {
                if child.is_text() && child.text_content().trim().is_empty() {
                    root.remove_child(child);
                }
            }
            children = root.children();
        }

        match children.len() {
            0 => None,
            1 => {
                let only = children.remove(0);
                only.detach();
                Some(only)
            }
            _ => Some(root),
        }
    }
}

fn convert(handle: &Handle) -> Option<Node> {
    match &handle.data {
        NodeData::Text { contents } => Some(Node::text(contents.borrow().to_string())),
        NodeData::Element { name, attrs, .. } => {
            let node = Node::element(&name.local);
            for attr in attrs.borrow().iter() {
                node.set_attribute(&attr.name.local, &attr.value);
            }
            for child in handle.children.borrow().iter() {
                if let Some(child) = convert(child) {
                    node.append_child(&child).ok()?;
                }
            }
            Some(node)
        }
        NodeData::Document
        | NodeData::Doctype { .. }
        | NodeData::Comment { .. }
        | NodeData::ProcessingInstruction { .. } => None,
    }
}
