//! Component Builder
//!
//! [`UltraComponent`] collects the declarative parts of a component and
//! [`UltraComponent::build`] turns them into a live node.
//!
//! # Example
//!
//! ```rust
//! use ultra_core::component::{Trigger, UltraComponent};
//! use ultra_core::dom::Document;
//! use ultra_core::reactive::ReactiveCell;
//!
//! let doc = Document::new("/");
//! let count = ReactiveCell::new(0);
//!
//! let c = count.clone();
//! let button = UltraComponent::new("<button>0</button>")
//!     .on("click", move |_| { c.update(|n| n + 1); })
//!     .trigger(Trigger::new(count.clone(), {
//!         let count = count.clone();
//!         move |node| node.set_text(&count.get().to_string())
//!     }))
//!     .build(&doc);
//!
//! count.set(3);
//! assert_eq!(button.text_content(), "3");
//! ```

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, warn};

use super::Child;
use crate::dom::{Document, Event, Handler, Lane, Node};
use crate::reactive::{Cleanup, Disposable, Source, Teardown};

type NodeAction = Arc<dyn Fn(&Node) + Send + Sync>;
type MountCallback = Box<dyn FnOnce(&Node) + Send>;

/// Binding of a source to a node-mutating action.
pub struct Trigger {
    source: Box<dyn Source>,
    action: NodeAction,
    lane: Lane,
}

impl Trigger {
    /// Run `action` with the component root whenever `source` notifies.
    pub fn new<S, F>(source: S, action: F) -> Self
    where
        S: Source + 'static,
        F: Fn(&Node) + Send + Sync + 'static,
    {
        Self {
            source: Box::new(source),
            action: Arc::new(action),
            lane: Lane::Immediate,
        }
    }

    /// Apply the action on the next frame instead of synchronously.
    ///
    /// There is no ordering guarantee between deferred and immediate
    /// triggers fired by the same change.
    pub fn deferred(mut self) -> Self {
        self.lane = Lane::NextFrame;
        self
    }

    pub fn lane(&self) -> Lane {
        self.lane
    }
}

impl fmt::Debug for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trigger").field("lane", &self.lane).finish()
    }
}

/// Declarative description of a component.
pub struct UltraComponent {
    root: Child,
    events: Vec<(String, Handler)>,
    styles: IndexMap<String, String>,
    classes: Vec<String>,
    children: Vec<Child>,
    triggers: Vec<Trigger>,
    mounted: Vec<MountCallback>,
    cleanups: Vec<Teardown>,
}

impl UltraComponent {
    /// Start from markup, or from an already built node.
    pub fn new(root: impl Into<Child>) -> Self {
        Self {
            root: root.into(),
            events: Vec::new(),
            styles: IndexMap::new(),
            classes: Vec::new(),
            children: Vec::new(),
            triggers: Vec::new(),
            mounted: Vec::new(),
            cleanups: Vec::new(),
        }
    }

    pub fn on<F>(mut self, event: &str, handler: F) -> Self
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.events.push((event.to_string(), Arc::new(handler)));
        self
    }

    /// Inline style. A later value for the same property wins.
    pub fn style(mut self, property: &str, value: &str) -> Self {
        self.styles.insert(property.to_string(), value.to_string());
        self
    }

    pub fn class(mut self, name: &str) -> Self {
        self.classes.push(name.to_string());
        self
    }

    pub fn child(mut self, child: impl Into<Child>) -> Self {
        self.children.push(child.into());
        self
    }

    /// Append `child` only when present.
    pub fn maybe_child<C: Into<Child>>(mut self, child: Option<C>) -> Self {
        if let Some(child) = child {
            self.children.push(child.into());
        }
        self
    }

    pub fn trigger(mut self, trigger: Trigger) -> Self {
        self.triggers.push(trigger);
        self
    }

    /// Run `f` once on the next frame after the node is built.
    pub fn on_mount<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&Node) + Send + 'static,
    {
        self.mounted.push(Box::new(f));
        self
    }

    /// Extra teardown run with the node's cleanup.
    pub fn on_cleanup<F>(mut self, f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.cleanups.push(Teardown::new(f));
        self
    }

    /// Build the node and attach its aggregate cleanup.
    pub fn build(self, doc: &Document) -> Node {
        let root = self.root.into_node(doc);
        let cleanup = Cleanup::new();

        // A passed-in node keeps its own teardowns.
        if let Some(existing) = root.cleanup() {
            cleanup.push(existing);
        }

        for (kind, handler) in self.events {
            let id = root.add_event_listener(&kind, move |event: &Event| handler(event));
            let weak = root.downgrade();
            cleanup.add(move || {
                if let Some(node) = weak.upgrade() {
                    node.remove_event_listener(&kind, id);
                }
            });
        }

        for (property, value) in &self.styles {
            if let Err(err) = root.set_style(property, value) {
                warn!(error = %err, "skipping style");
            }
        }

        for class in &self.classes {
            if let Err(err) = root.add_class(class) {
                warn!(error = %err, "skipping class");
            }
        }

        for child in self.children {
            let node = child.into_node(doc);
            if let Some(child_cleanup) = node.cleanup() {
                cleanup.push(child_cleanup);
            }
            if let Err(err) = root.append_child(&node) {
                warn!(error = %err, "could not append child");
            }
        }

        let trigger_count = self.triggers.len();
        for trigger in self.triggers {
            let Trigger {
                source,
                action,
                lane,
            } = trigger;
            let node = root.clone();
            let frames = doc.frames().clone();
            let owner = cleanup.clone();
            let unsubscribe = source.watch(Arc::new(move || {
                let node = node.clone();
                let action = Arc::clone(&action);
                let owner = owner.clone();
                frames.dispatch(lane, move || {
                    // A deferred run can outlive the component.
                    if !owner.has_run() {
                        action(&node);
                    }
                });
            }));
            cleanup.push(unsubscribe);
        }

        for callback in self.mounted {
            let node = root.clone();
            doc.frames().request_frame(move || callback(&node));
        }

        for teardown in self.cleanups {
            cleanup.push(teardown);
        }

        debug!(
            node = %root.describe(),
            teardowns = cleanup.len(),
            triggers = trigger_count,
            "component built"
        );
        root.set_cleanup(cleanup);
        root
    }
}

impl fmt::Debug for UltraComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UltraComponent")
            .field("root", &self.root)
            .field("events", &self.events.len())
            .field("styles", &self.styles)
            .field("classes", &self.classes)
            .field("children", &self.children.len())
            .field("triggers", &self.triggers.len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::ReactiveCell;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn builds_root_with_styles_and_classes() {
        let doc = Document::new("/");
        let node = UltraComponent::new("<div><span>a</span></div>")
            .style("color", "red")
            .class("card")
            .class("wide")
            .build(&doc);

        assert_eq!(node.tag().as_deref(), Some("div"));
        assert_eq!(node.style("color").as_deref(), Some("red"));
        assert_eq!(node.classes(), vec!["card", "wide"]);
        assert_eq!(node.child_count(), 1);
    }

    #[test]
    fn bad_style_is_skipped() {
        let doc = Document::new("/");
        let node = UltraComponent::new("<div></div>")
            .style("", "red")
            .style("margin", "1px")
            .build(&doc);
        assert_eq!(node.style("margin").as_deref(), Some("1px"));
    }

    #[test]
    fn parse_failure_yields_placeholder() {
        let doc = Document::new("/");
        let node = UltraComponent::new("").class("x").build(&doc);
        assert!(node.has_attribute("data-ultra-placeholder"));
        assert!(node.has_class("x"));
    }

    #[test]
    fn listeners_are_removed_by_cleanup() {
        let doc = Document::new("/");
        let clicks = Arc::new(AtomicI32::new(0));
        let c = clicks.clone();
        let node = UltraComponent::new("<button></button>")
            .on("click", move |_| {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .build(&doc);

        node.dispatch_event(&Event::click());
        assert_eq!(clicks.load(Ordering::SeqCst), 1);

        node.dispose();
        assert_eq!(node.listener_count("click"), 0);
        node.dispatch_event(&Event::click());
        assert_eq!(clicks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn null_children_are_skipped() {
        let doc = Document::new("/");
        let show = false;
        let node = UltraComponent::new("<ul></ul>")
            .child("<li>one</li>")
            .maybe_child(show.then_some("<li>two</li>"))
            .maybe_child(Some("<li>three</li>"))
            .build(&doc);
        assert_eq!(node.inner_html(), "<li>one</li><li>three</li>");
    }

    #[test]
    fn child_cleanup_propagates() {
        let doc = Document::new("/");
        let torn_down = Arc::new(AtomicI32::new(0));
        let t = torn_down.clone();
        let child = UltraComponent::new("<span></span>")
            .on_cleanup(move || {
                t.fetch_add(1, Ordering::SeqCst);
            })
            .build(&doc);

        let parent = UltraComponent::new("<div></div>").child(child).build(&doc);
        parent.dispose();
        parent.dispose();
        assert_eq!(torn_down.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn immediate_trigger_applies_on_notify() {
        let doc = Document::new("/");
        let label = ReactiveCell::new(String::from("a"));
        let l = label.clone();
        let node = UltraComponent::new("<p>a</p>")
            .trigger(Trigger::new(label.clone(), move |node| node.set_text(&l.get())))
            .build(&doc);

        label.set("b".to_string());
        assert_eq!(node.text_content(), "b");

        node.dispose();
        assert_eq!(label.subscriber_count(), 0);
        label.set("c".to_string());
        assert_eq!(node.text_content(), "b");
    }

    #[test]
    fn deferred_trigger_waits_for_frame() {
        let doc = Document::new("/");
        let count = ReactiveCell::new(0);
        let c = count.clone();
        let node = UltraComponent::new("<p>0</p>")
            .trigger(
                Trigger::new(count.clone(), move |node| node.set_text(&c.get().to_string()))
                    .deferred(),
            )
            .build(&doc);

        count.set(5);
        assert_eq!(node.text_content(), "0");
        doc.frames().flush();
        assert_eq!(node.text_content(), "5");
    }

    #[test]
    fn deferred_trigger_skipped_after_cleanup() {
        let doc = Document::new("/");
        let count = ReactiveCell::new(0);
        let node = UltraComponent::new("<p>0</p>")
            .trigger(Trigger::new(count.clone(), |node| node.set_text("changed")).deferred())
            .build(&doc);

        count.set(1);
        node.dispose();
        doc.frames().flush();
        assert_eq!(node.text_content(), "0");
    }

    #[test]
    fn mount_callbacks_run_next_frame_isolated() {
        let doc = Document::new("/");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s1 = seen.clone();
        let s2 = seen.clone();
        let node = UltraComponent::new("<div></div>")
            .on_mount(move |node| s1.lock().push(node.describe()))
            .on_mount(|_| panic!("mount failed"))
            .on_mount(move |_| s2.lock().push("third".to_string()))
            .build(&doc);

        assert!(seen.lock().is_empty());
        assert_eq!(doc.frames().flush(), 3);
        assert_eq!(*seen.lock(), vec![node.describe(), "third".to_string()]);
    }

    #[test]
    fn prebuilt_root_keeps_its_cleanup() {
        let doc = Document::new("/");
        let ran = Arc::new(AtomicI32::new(0));
        let r1 = ran.clone();
        let r2 = ran.clone();
        let inner = UltraComponent::new("<div></div>")
            .on_cleanup(move || {
                r1.fetch_add(1, Ordering::SeqCst);
            })
            .build(&doc);
        let outer = UltraComponent::new(inner)
            .on_cleanup(move || {
                r2.fetch_add(10, Ordering::SeqCst);
            })
            .build(&doc);

        outer.dispose();
        assert_eq!(ran.load(Ordering::SeqCst), 11);
    }
}
