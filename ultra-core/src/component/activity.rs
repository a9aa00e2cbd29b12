//! Activity
//!
//! An activity is a component whose visibility follows a boolean state. The
//! state is evaluated once at build time and again on every notification of
//! the watched sources, toggling either the `display` or the `visibility`
//! style channel.

use std::fmt;
use std::sync::Arc;

use tracing::{trace, warn};

use super::UltraComponent;
use crate::dom::{Document, Node};
use crate::reactive::{guard_with, Cleanup, Disposable, Source};

/// Which style channel an activity toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActivityType {
    /// `display: none` when hidden; the property is removed when shown.
    #[default]
    Display,
    /// `visibility: hidden` / `visibility: visible`.
    Visibility,
}

impl ActivityType {
    /// Parse a type name. Unknown names fall back to `Display` with a warning.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "display" => ActivityType::Display,
            "visibility" => ActivityType::Visibility,
            other => {
                warn!(activity_type = other, "unsupported activity type; using display");
                ActivityType::Display
            }
        }
    }

    fn apply(self, node: &Node, visible: bool) {
        let result = match (self, visible) {
            (ActivityType::Display, true) => {
                node.remove_style("display");
                Ok(())
            }
            (ActivityType::Display, false) => node.set_style("display", "none"),
            (ActivityType::Visibility, true) => node.set_style("visibility", "visible"),
            (ActivityType::Visibility, false) => node.set_style("visibility", "hidden"),
        };
        if let Err(err) = result {
            warn!(error = %err, "could not toggle activity");
        }
    }
}

type StateFn = Arc<dyn Fn() -> bool + Send + Sync>;

/// A component shown or hidden by a boolean state.
pub struct UltraActivity {
    component: UltraComponent,
    state: StateFn,
    kind: Option<String>,
    sources: Vec<Box<dyn Source>>,
}

impl UltraActivity {
    pub fn new<F>(component: UltraComponent, state: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        Self {
            component,
            state: Arc::new(state),
            kind: None,
            sources: Vec::new(),
        }
    }

    /// Toggle channel, `"display"` or `"visibility"`. Defaults to the
    /// document's configured `activity_default`.
    pub fn kind(mut self, kind: &str) -> Self {
        self.kind = Some(kind.to_string());
        self
    }

    /// Re-evaluate the state whenever `source` notifies.
    pub fn watch<S: Source + 'static>(mut self, source: S) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    pub fn build(self, doc: &Document) -> Node {
        let kind = ActivityType::parse(
            self.kind
                .as_deref()
                .unwrap_or(&doc.config().activity_default),
        );
        let node = self.component.build(doc);

        let toggle = {
            let node = node.clone();
            let state = self.state;
            Arc::new(move || {
                if let Some(visible) = guard_with("activity state", || state()) {
                    trace!(node = %node.describe(), visible, "activity toggled");
                    kind.apply(&node, visible);
                }
            })
        };
        toggle();

        let cleanup = node.cleanup().unwrap_or_else(|| {
            let cleanup = Cleanup::new();
            node.set_cleanup(cleanup.clone());
            cleanup
        });
        for source in &self.sources {
            cleanup.push(source.watch(toggle.clone()));
        }
        node
    }
}

impl fmt::Debug for UltraActivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UltraActivity")
            .field("component", &self.component)
            .field("kind", &self.kind)
            .field("sources", &self.sources.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UltraConfig;
    use crate::reactive::ReactiveCell;

    #[test]
    fn display_toggle() {
        let doc = Document::new("/");
        let open = ReactiveCell::new(false);
        let o = open.clone();
        let node = UltraActivity::new(UltraComponent::new("<aside></aside>"), move || o.get())
            .watch(open.clone())
            .build(&doc);

        assert_eq!(node.style("display").as_deref(), Some("none"));
        open.set(true);
        assert_eq!(node.style("display"), None);
        open.set(false);
        assert_eq!(node.style("display").as_deref(), Some("none"));
    }

    #[test]
    fn visibility_toggle() {
        let doc = Document::new("/");
        let open = ReactiveCell::new(true);
        let o = open.clone();
        let node = UltraActivity::new(UltraComponent::new("<div></div>"), move || o.get())
            .kind("visibility")
            .watch(open.clone())
            .build(&doc);

        assert_eq!(node.style("visibility").as_deref(), Some("visible"));
        open.set(false);
        assert_eq!(node.style("visibility").as_deref(), Some("hidden"));
        assert_eq!(node.style("display"), None);
    }

    #[test]
    fn unknown_type_falls_back_to_display() {
        assert_eq!(ActivityType::parse("opacity"), ActivityType::Display);
        assert_eq!(ActivityType::parse(" Visibility "), ActivityType::Visibility);

        let doc = Document::new("/");
        let node = UltraActivity::new(UltraComponent::new("<div></div>"), || false)
            .kind("opacity")
            .build(&doc);
        assert_eq!(node.style("display").as_deref(), Some("none"));
    }

    #[test]
    fn default_kind_comes_from_config() {
        let config = UltraConfig {
            activity_default: "visibility".into(),
            ..UltraConfig::default()
        };
        let doc = Document::with_config("/", config);
        let node = UltraActivity::new(UltraComponent::new("<div></div>"), || false).build(&doc);
        assert_eq!(node.style("visibility").as_deref(), Some("hidden"));
    }

    #[test]
    fn multiple_sources_and_cleanup() {
        let doc = Document::new("/");
        let a = ReactiveCell::new(true);
        let b = ReactiveCell::new(true);
        let (ra, rb) = (a.clone(), b.clone());
        let node = UltraActivity::new(UltraComponent::new("<div></div>"), move || {
            ra.get() && rb.get()
        })
        .watch(a.clone())
        .watch(b.clone())
        .build(&doc);

        b.set(false);
        assert_eq!(node.style("display").as_deref(), Some("none"));

        node.dispose();
        assert_eq!(a.subscriber_count(), 0);
        assert_eq!(b.subscriber_count(), 0);
        b.set(true);
        assert_eq!(node.style("display").as_deref(), Some("none"));
    }
}
