//! DOM Nodes
//!
//! A small in-memory document tree: elements, text and fragments. Nodes are
//! shared handles (`Arc` inside), so cloning a `Node` clones the reference,
//! not the subtree.
//!
//! Parents hold their children strongly and children point back weakly, so
//! detaching a subtree is enough to let it drop.
//!
//! Locks are never held across user callbacks or across a call into another
//! node's lock-taking methods.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::{IndexMap, IndexSet};
use parking_lot::RwLock;
use smallvec::SmallVec;
use thiserror::Error;

use super::event::{Event, ListenerId};
use crate::reactive::{guard, Cleanup, Containment, Disposable};

/// Elements that never have children or a closing tag.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// Event handler stored on a node.
pub type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

/// Unique identifier for a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

/// The kind of node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// An element with a lowercase tag name.
    Element(String),

    /// A text node. Has content, never children.
    Text,

    /// A detached container. Appending a fragment moves its children.
    Fragment,
}

/// Errors raised by tree and style mutations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomError {
    #[error("invalid style property `{0}`")]
    InvalidStyleProperty(String),

    #[error("invalid value `{value}` for style property `{property}`")]
    InvalidStyleValue { property: String, value: String },

    #[error("invalid class name `{0}`")]
    InvalidClassName(String),

    #[error("{0} is not an element")]
    NotAnElement(String),

    #[error("{0} cannot have children")]
    NotAContainer(String),

    #[error("cannot insert {child} into {parent}: the parent is inside the child")]
    HierarchyRequest { parent: String, child: String },
}

struct Listener {
    id: ListenerId,
    handler: Handler,
}

struct NodeData {
    kind: NodeKind,
    text: String,
    attributes: IndexMap<String, String>,
    style: IndexMap<String, String>,
    classes: IndexSet<String>,
    children: Vec<Node>,
    parent: Option<Weak<NodeInner>>,
    listeners: IndexMap<String, Vec<Listener>>,
    cleanup: Option<Cleanup>,
}

struct NodeInner {
    id: NodeId,
    data: RwLock<NodeData>,
}

/// A node in the document tree.
#[derive(Clone)]
pub struct Node(Arc<NodeInner>);

/// Non-owning node reference.
#[derive(Clone)]
pub struct WeakNode(Weak<NodeInner>);

impl WeakNode {
    pub fn upgrade(&self) -> Option<Node> {
        self.0.upgrade().map(Node)
    }
}

impl Node {
    fn with_kind(kind: NodeKind, text: String) -> Self {
        Self(Arc::new(NodeInner {
            id: NodeId::new(),
            data: RwLock::new(NodeData {
                kind,
                text,
                attributes: IndexMap::new(),
                style: IndexMap::new(),
                classes: IndexSet::new(),
                children: Vec::new(),
                parent: None,
                listeners: IndexMap::new(),
                cleanup: None,
            }),
        }))
    }

    /// Create an element.
    pub fn element(tag: &str) -> Self {
        Self::with_kind(NodeKind::Element(tag.to_ascii_lowercase()), String::new())
    }

    /// Create a text node.
    pub fn text(content: impl Into<String>) -> Self {
        Self::with_kind(NodeKind::Text, content.into())
    }

    /// Create an empty fragment.
    pub fn fragment() -> Self {
        Self::with_kind(NodeKind::Fragment, String::new())
    }

    pub fn id(&self) -> NodeId {
        self.0.id
    }

    pub fn kind(&self) -> NodeKind {
        self.0.data.read().kind.clone()
    }

    /// Tag name for elements.
    pub fn tag(&self) -> Option<String> {
        match &self.0.data.read().kind {
            NodeKind::Element(tag) => Some(tag.clone()),
            _ => None,
        }
    }

    pub fn is_element(&self) -> bool {
        matches!(self.0.data.read().kind, NodeKind::Element(_))
    }

    pub fn is_text(&self) -> bool {
        matches!(self.0.data.read().kind, NodeKind::Text)
    }

    pub fn is_fragment(&self) -> bool {
        matches!(self.0.data.read().kind, NodeKind::Fragment)
    }

    pub fn downgrade(&self) -> WeakNode {
        WeakNode(Arc::downgrade(&self.0))
    }

    // ------------------------------------------------------------------
    // Tree
    // ------------------------------------------------------------------

    pub fn parent(&self) -> Option<Node> {
        self.0
            .data
            .read()
            .parent
            .as_ref()
            .and_then(Weak::upgrade)
            .map(Node)
    }

    pub fn children(&self) -> Vec<Node> {
        self.0.data.read().children.clone()
    }

    pub fn child_count(&self) -> usize {
        self.0.data.read().children.len()
    }

    /// True if `self` is `other` or one of its ancestors.
    pub fn contains(&self, other: &Node) -> bool {
        let mut current = Some(other.clone());
        while let Some(node) = current {
            if node == *self {
                return true;
            }
            current = node.parent();
        }
        false
    }

    /// Append `child`, moving it from its current parent if it has one.
    ///
    /// Appending a fragment moves the fragment's children instead.
    pub fn append_child(&self, child: &Node) -> Result<(), DomError> {
        if self.is_text() {
            return Err(DomError::NotAContainer(self.describe()));
        }
        if child.contains(self) {
            return Err(DomError::HierarchyRequest {
                parent: self.describe(),
                child: child.describe(),
            });
        }

        if child.is_fragment() {
            for grandchild in child.clear_children() {
                self.attach(grandchild);
            }
        } else {
            child.detach();
            self.attach(child.clone());
        }
        Ok(())
    }

    fn attach(&self, child: Node) {
        child.0.data.write().parent = Some(Arc::downgrade(&self.0));
        self.0.data.write().children.push(child);
    }

    /// Remove `child` if it is a direct child.
    pub fn remove_child(&self, child: &Node) -> bool {
        let removed = {
            let mut data = self.0.data.write();
            let before = data.children.len();
            data.children.retain(|c| c != child);
            before != data.children.len()
        };
        if removed {
            child.0.data.write().parent = None;
        }
        removed
    }

    /// Remove this node from its parent.
    pub fn detach(&self) {
        if let Some(parent) = self.parent() {
            parent.remove_child(self);
        }
    }

    /// Remove and return every child.
    pub fn clear_children(&self) -> Vec<Node> {
        let children = std::mem::take(&mut self.0.data.write().children);
        for child in &children {
            child.0.data.write().parent = None;
        }
        children
    }

    /// Swap all children for `child`. Returns the removed children.
    pub fn replace_children(&self, child: &Node) -> Result<Vec<Node>, DomError> {
        let old = self.clear_children();
        self.append_child(child)?;
        Ok(old)
    }

    /// Depth-first search including `self`.
    pub fn find<F>(&self, predicate: F) -> Option<Node>
    where
        F: Fn(&Node) -> bool,
    {
        fn walk(node: &Node, predicate: &dyn Fn(&Node) -> bool) -> Option<Node> {
            if predicate(node) {
                return Some(node.clone());
            }
            node.children().iter().find_map(|child| walk(child, predicate))
        }
        walk(self, &predicate)
    }

    pub fn find_by_tag(&self, tag: &str) -> Option<Node> {
        self.find(|n| n.tag().as_deref() == Some(tag))
    }

    // ------------------------------------------------------------------
    // Attributes, text
    // ------------------------------------------------------------------

    /// Set an attribute. `class` and `style` update the class set and the
    /// inline style map respectively.
    pub fn set_attribute(&self, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        match name.as_str() {
            "class" => {
                let mut data = self.0.data.write();
                data.classes = value.split_whitespace().map(str::to_string).collect();
            }
            "style" => {
                for declaration in value.split(';') {
                    if let Some((property, value)) = declaration.split_once(':') {
                        // Unparseable declarations are dropped, as a browser would.
                        let _ = self.set_style(property, value);
                    }
                }
            }
            _ => {
                self.0
                    .data
                    .write()
                    .attributes
                    .insert(name, value.to_string());
            }
        }
    }

    pub fn get_attribute(&self, name: &str) -> Option<String> {
        let data = self.0.data.read();
        match name {
            "class" if !data.classes.is_empty() => {
                Some(data.classes.iter().cloned().collect::<Vec<_>>().join(" "))
            }
            "style" if !data.style.is_empty() => Some(style_text(&data.style)),
            _ => data.attributes.get(name).cloned(),
        }
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.get_attribute(name).is_some()
    }

    pub fn remove_attribute(&self, name: &str) -> Option<String> {
        self.0.data.write().attributes.shift_remove(name)
    }

    /// Replace the content: text nodes get new text, containers get a single
    /// text child.
    pub fn set_text(&self, content: &str) {
        if self.is_text() {
            self.0.data.write().text = content.to_string();
            return;
        }
        self.clear_children();
        self.attach(Node::text(content));
    }

    /// Concatenated text of this node and its descendants.
    pub fn text_content(&self) -> String {
        if self.is_text() {
            return self.0.data.read().text.clone();
        }
        self.children().iter().map(Node::text_content).collect()
    }

    // ------------------------------------------------------------------
    // Style and classes
    // ------------------------------------------------------------------

    pub fn set_style(&self, property: &str, value: &str) -> Result<(), DomError> {
        let property = property.trim();
        if !self.is_element() {
            return Err(DomError::NotAnElement(self.describe()));
        }
        if property.is_empty()
            || !property
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err(DomError::InvalidStyleProperty(property.to_string()));
        }
        if value.contains([';', '{', '}']) {
            return Err(DomError::InvalidStyleValue {
                property: property.to_string(),
                value: value.to_string(),
            });
        }
        self.0
            .data
            .write()
            .style
            .insert(property.to_ascii_lowercase(), value.trim().to_string());
        Ok(())
    }

    pub fn style(&self, property: &str) -> Option<String> {
        self.0.data.read().style.get(property).cloned()
    }

    pub fn remove_style(&self, property: &str) -> Option<String> {
        self.0.data.write().style.shift_remove(property)
    }

    pub fn add_class(&self, name: &str) -> Result<(), DomError> {
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(DomError::InvalidClassName(name.to_string()));
        }
        if !self.is_element() {
            return Err(DomError::NotAnElement(self.describe()));
        }
        self.0.data.write().classes.insert(name.to_string());
        Ok(())
    }

    pub fn remove_class(&self, name: &str) -> bool {
        self.0.data.write().classes.shift_remove(name)
    }

    pub fn has_class(&self, name: &str) -> bool {
        self.0.data.read().classes.contains(name)
    }

    pub fn classes(&self) -> Vec<String> {
        self.0.data.read().classes.iter().cloned().collect()
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    pub fn add_event_listener<F>(&self, kind: &str, handler: F) -> ListenerId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = ListenerId::new();
        self.0
            .data
            .write()
            .listeners
            .entry(kind.to_string())
            .or_default()
            .push(Listener {
                id,
                handler: Arc::new(handler),
            });
        id
    }

    pub fn remove_event_listener(&self, kind: &str, id: ListenerId) -> bool {
        let mut data = self.0.data.write();
        match data.listeners.get_mut(kind) {
            Some(listeners) => {
                let before = listeners.len();
                listeners.retain(|l| l.id != id);
                before != listeners.len()
            }
            None => false,
        }
    }

    pub fn listener_count(&self, kind: &str) -> usize {
        self.0
            .data
            .read()
            .listeners
            .get(kind)
            .map_or(0, Vec::len)
    }

    /// Invoke this node's listeners for `event`. Returns how many ran.
    ///
    /// Events do not bubble.
    pub fn dispatch_event(&self, event: &Event) -> usize {
        let handlers: SmallVec<[Handler; 4]> = self
            .0
            .data
            .read()
            .listeners
            .get(event.kind())
            .map(|ls| ls.iter().map(|l| Arc::clone(&l.handler)).collect())
            .unwrap_or_default();

        for handler in &handlers {
            guard("event listener", || handler(event));
        }
        handlers.len()
    }

    // ------------------------------------------------------------------
    // Cleanup
    // ------------------------------------------------------------------

    /// Attach the aggregate cleanup for this node.
    pub fn set_cleanup(&self, cleanup: Cleanup) {
        self.0.data.write().cleanup = Some(cleanup);
    }

    // ------------------------------------------------------------------
    // Serialization
    // ------------------------------------------------------------------

    /// Serialize this node and its subtree as HTML.
    pub fn outer_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    /// Serialize only the children.
    pub fn inner_html(&self) -> String {
        let mut out = String::new();
        for child in self.children() {
            child.write_html(&mut out);
        }
        out
    }

    fn write_html(&self, out: &mut String) {
        let (kind, text, head, children) = {
            let data = self.0.data.read();
            let mut head = String::new();
            for (name, value) in &data.attributes {
                head.push_str(&format!(" {}=\"{}\"", name, escape_attribute(value)));
            }
            if !data.classes.is_empty() {
                let classes = data.classes.iter().cloned().collect::<Vec<_>>().join(" ");
                head.push_str(&format!(" class=\"{}\"", escape_attribute(&classes)));
            }
            if !data.style.is_empty() {
                head.push_str(&format!(
                    " style=\"{}\"",
                    escape_attribute(&style_text(&data.style))
                ));
            }
            (
                data.kind.clone(),
                data.text.clone(),
                head,
                data.children.clone(),
            )
        };

        match kind {
            NodeKind::Text => out.push_str(&escape_text(&text)),
            NodeKind::Fragment => {
                for child in &children {
                    child.write_html(out);
                }
            }
            NodeKind::Element(tag) => {
                out.push('<');
                out.push_str(&tag);
                out.push_str(&head);
                out.push('>');
                if VOID_ELEMENTS.contains(&tag.as_str()) {
                    return;
                }
                for child in &children {
                    child.write_html(out);
                }
                out.push_str("</");
                out.push_str(&tag);
                out.push('>');
            }
        }
    }

    /// Short label, e.g. `<div> (node 4)`.
    pub fn describe(&self) -> String {
        match &self.0.data.read().kind {
            NodeKind::Element(tag) => format!("<{}> (node {})", tag, self.0.id.raw()),
            NodeKind::Text => format!("#text (node {})", self.0.id.raw()),
            NodeKind::Fragment => format!("#fragment (node {})", self.0.id.raw()),
        }
    }
}

fn style_text(style: &IndexMap<String, String>) -> String {
    style
        .iter()
        .map(|(k, v)| format!("{k}: {v}"))
        .collect::<Vec<_>>()
        .join("; ")
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attribute(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

impl Disposable for Node {
    fn cleanup(&self) -> Option<Cleanup> {
        self.0.data.read().cleanup.clone()
    }
}

impl Containment for Node {
    fn contains(&self, other: &Self) -> bool {
        Node::contains(self, other)
    }

    fn describe(&self) -> String {
        Node::describe(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI32;

    #[test]
    fn node_ids_are_unique() {
        let id1 = NodeId::new();
        let id2 = NodeId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn append_and_contains() {
        let root = Node::element("div");
        let child = Node::element("span");
        let grandchild = Node::text("hi");
        root.append_child(&child).unwrap();
        child.append_child(&grandchild).unwrap();

        assert!(root.contains(&grandchild));
        assert!(root.contains(&root));
        assert!(!child.contains(&root));
        assert_eq!(grandchild.parent(), Some(child.clone()));
    }

    #[test]
    fn append_moves_between_parents() {
        let a = Node::element("div");
        let b = Node::element("div");
        let child = Node::element("p");

        a.append_child(&child).unwrap();
        b.append_child(&child).unwrap();

        assert_eq!(a.child_count(), 0);
        assert_eq!(b.children(), vec![child.clone()]);
        assert!(!a.contains(&child));
    }

    #[test]
    fn append_rejects_cycles() {
        let outer = Node::element("div");
        let inner = Node::element("div");
        outer.append_child(&inner).unwrap();

        assert!(matches!(
            inner.append_child(&outer),
            Err(DomError::HierarchyRequest { .. })
        ));
        assert!(matches!(
            outer.append_child(&outer),
            Err(DomError::HierarchyRequest { .. })
        ));
    }

    #[test]
    fn fragment_children_are_moved() {
        let fragment = Node::fragment();
        fragment.append_child(&Node::element("a")).unwrap();
        fragment.append_child(&Node::element("b")).unwrap();

        let root = Node::element("div");
        root.append_child(&fragment).unwrap();

        assert_eq!(root.child_count(), 2);
        assert_eq!(fragment.child_count(), 0);
        assert_eq!(root.outer_html(), "<div><a></a><b></b></div>");
    }

    #[test]
    fn styles_and_classes() {
        let node = Node::element("div");
        node.set_style("color", "red").unwrap();
        node.set_style("--gap", "4px").unwrap();
        node.add_class("card").unwrap();

        assert_eq!(node.style("color").as_deref(), Some("red"));
        assert!(node.has_class("card"));
        assert!(matches!(
            node.set_style("co lor", "red"),
            Err(DomError::InvalidStyleProperty(_))
        ));
        assert!(matches!(
            node.set_style("color", "red; background: blue"),
            Err(DomError::InvalidStyleValue { .. })
        ));
        assert!(node.add_class("two words").is_err());
        assert_eq!(
            node.outer_html(),
            "<div class=\"card\" style=\"color: red; --gap: 4px\"></div>"
        );
    }

    #[test]
    fn class_and_style_attributes_route_to_sets() {
        let node = Node::element("div");
        node.set_attribute("class", "a  b");
        node.set_attribute("style", "display: none; bad prop: x");

        assert_eq!(node.classes(), vec!["a", "b"]);
        assert_eq!(node.style("display").as_deref(), Some("none"));
        assert_eq!(node.get_attribute("class").as_deref(), Some("a b"));
    }

    #[test]
    fn listeners_fire_and_remove() {
        let node = Node::element("button");
        let clicks = Arc::new(AtomicI32::new(0));
        let c = clicks.clone();
        let id = node.add_event_listener("click", move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        node.add_event_listener("click", |_| panic!("listener failure"));

        assert_eq!(node.dispatch_event(&Event::click()), 2);
        assert!(node.remove_event_listener("click", id));
        node.dispatch_event(&Event::click());

        assert_eq!(clicks.load(Ordering::SeqCst), 1);
        assert_eq!(node.listener_count("click"), 1);
    }

    #[test]
    fn text_content_and_escaping() {
        let node = Node::element("p");
        node.set_text("a < b & c");
        assert_eq!(node.text_content(), "a < b & c");
        assert_eq!(node.outer_html(), "<p>a &lt; b &amp; c</p>");
    }

    #[test]
    fn void_elements_have_no_closing_tag() {
        let node = Node::element("img");
        node.set_attribute("alt", "say \"hi\"");
        assert_eq!(node.outer_html(), "<img alt=\"say &quot;hi&quot;\">");
    }
}
