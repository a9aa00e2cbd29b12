//! Navigation links.
//!
//! A link is an `<a>` element whose click handler replaces the browser's
//! default navigation with a history push. Clicks with a modifier key held,
//! or with a non-primary button, are left alone so "open in new tab" and
//! friends keep working.

use tracing::{debug, warn};

use crate::component::{Child, UltraComponent};
use crate::dom::{Document, Event, Node};

/// Push `href` onto the session history and announce the navigation.
pub fn navigate(doc: &Document, href: &str) {
    debug!(href, "navigate");
    doc.history().push(href);
}

/// Builder for a navigation link.
#[derive(Debug)]
pub struct Link {
    href: String,
    children: Vec<Child>,
    transition: Option<bool>,
}

impl Link {
    pub fn new(href: &str) -> Self {
        Self {
            href: href.to_string(),
            children: Vec::new(),
            transition: None,
        }
    }

    pub fn child(mut self, child: impl Into<Child>) -> Self {
        self.children.push(child.into());
        self
    }

    /// Wrap the navigation in a view transition when the platform supports
    /// it. Defaults to the document's `view_transitions` setting.
    pub fn transition(mut self, enabled: bool) -> Self {
        self.transition = Some(enabled);
        self
    }

    pub fn build(self, doc: &Document) -> Node {
        if self.href.is_empty() {
            warn!("link has no href");
        }

        let transition = self.transition.unwrap_or(doc.config().view_transitions);
        let href = self.href.clone();
        let target = doc.clone();
        let mut component = UltraComponent::new("<a></a>").on("click", move |event: &Event| {
            if event.modifiers().any() || event.button() != 0 || href.is_empty() {
                return;
            }
            event.prevent_default();
            if transition {
                target.start_view_transition(|| navigate(&target, &href));
            } else {
                navigate(&target, &href);
            }
        });
        for child in self.children {
            component = component.child(child);
        }

        let node = component.build(doc);
        node.set_attribute("href", &self.href);
        node
    }
}

/// Shorthand for [`Link`].
pub fn link(doc: &Document, href: &str, children: Vec<Child>, transition: bool) -> Node {
    children
        .into_iter()
        .fold(Link::new(href), |link, child| link.child(child))
        .transition(transition)
        .build(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Modifiers;
    use crate::reactive::Disposable;

    #[test]
    fn click_navigates() {
        let doc = Document::new("/");
        let a = Link::new("/about").child("About").build(&doc);
        assert_eq!(a.outer_html(), r#"<a href="/about">About</a>"#);

        let click = Event::click();
        a.dispatch_event(&click);
        assert!(click.default_prevented());
        assert_eq!(doc.location().path(), "/about");
    }

    #[test]
    fn modified_clicks_are_ignored() {
        let doc = Document::new("/");
        let a = link(&doc, "/about", vec![], false);

        let ctrl = Event::click().with_modifiers(Modifiers {
            ctrl: true,
            ..Modifiers::default()
        });
        a.dispatch_event(&ctrl);
        assert!(!ctrl.default_prevented());

        let middle = Event::click().with_button(1);
        a.dispatch_event(&middle);
        assert!(!middle.default_prevented());

        assert_eq!(doc.location().path(), "/");
        assert_eq!(doc.history().len(), 1);
    }

    #[test]
    fn transition_used_only_when_supported() {
        let doc = Document::new("/");
        let a = link(&doc, "/one", vec!["one".into()], true);
        a.dispatch_event(&Event::click());
        assert_eq!(doc.view_transition_count(), 0);
        assert_eq!(doc.location().path(), "/one");

        doc.set_view_transitions_supported(true);
        let b = link(&doc, "/two", vec![], true);
        b.dispatch_event(&Event::click());
        assert_eq!(doc.view_transition_count(), 1);
        assert_eq!(doc.location().path(), "/two");
    }

    #[test]
    fn empty_href_does_nothing() {
        let doc = Document::new("/");
        let a = Link::new("").build(&doc);
        let click = Event::click();
        a.dispatch_event(&click);
        assert!(!click.default_prevented());
        assert_eq!(doc.history().len(), 1);
    }

    #[test]
    fn cleanup_detaches_handler() {
        let doc = Document::new("/");
        let a = Link::new("/x").build(&doc);
        a.dispose();
        a.dispatch_event(&Event::click());
        assert_eq!(doc.location().path(), "/");
    }
}
