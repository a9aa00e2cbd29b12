//! Scoped Styles
//!
//! [`StyleScope`] rewrites the class selectors of a CSS text into generated
//! names and injects the rewritten sheet into the document head. It returns
//! the mapping from original to generated class names.
//!
//! The cache is keyed by a stable hash of the CSS text, so scoping the same
//! text twice injects one `<style>` element and returns the same mapping.
//! The cache belongs to the `StyleScope` value the application constructs;
//! a fresh scope starts with an empty cache.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use indexmap::IndexMap;
use tracing::{debug, warn};

use super::node::Node;

/// Original class name to generated class name.
pub type ClassMap = IndexMap<String, String>;

/// First 8 bytes of the BLAKE3 digest, little-endian.
pub fn stable_hash(text: &str) -> u64 {
    let digest = blake3::hash(text.as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest.as_bytes()[..8]);
    u64::from_le_bytes(head)
}

/// Style scoping cache bound to one document head.
pub struct StyleScope {
    head: Node,
    prefix: String,
    cache: DashMap<u64, Arc<ClassMap>>,
}

impl StyleScope {
    pub fn new(head: Node, prefix: impl Into<String>) -> Self {
        Self {
            head,
            prefix: prefix.into(),
            cache: DashMap::new(),
        }
    }

    /// Scope `css`, injecting it on first sight.
    pub fn scope(&self, css: &str) -> Arc<ClassMap> {
        let hash = stable_hash(css);
        let entry = self.cache.entry(hash).or_insert_with(|| {
            let suffix = hash & 0xffff_ffff;
            let mut classes = ClassMap::new();
            let rewritten = rewrite_classes(css, |class| {
                let scoped = classes
                    .entry(class.to_string())
                    .or_insert_with(|| format!("{}-{:08x}-{}", self.prefix, suffix, class));
                scoped.clone()
            });

            let sheet = Node::element("style");
            sheet.set_attribute("data-ultra-scope", &format!("{hash:016x}"));
            sheet.set_text(&rewritten);
            if let Err(err) = self.head.append_child(&sheet) {
                warn!(error = %err, "could not inject scoped stylesheet");
            }
            debug!(hash, classes = classes.len(), "stylesheet injected");
            Arc::new(classes)
        });
        Arc::clone(entry.value())
    }

    /// Number of distinct CSS texts scoped so far.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

impl fmt::Debug for StyleScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StyleScope")
            .field("prefix", &self.prefix)
            .field("sheets", &self.len())
            .finish()
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '-'
}

fn is_ident(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Rewrite every `.class` token in `css` through `map`.
///
/// A dot counts as a class selector when it is followed by an identifier
/// and not preceded by an identifier character, which excludes numbers
/// (`0.5em`) and file names (`a.png`). Comments and quoted strings are
/// copied verbatim.
fn rewrite_classes(css: &str, mut map: impl FnMut(&str) -> String) -> String {
    let chars: Vec<char> = css.chars().collect();
    let mut out = String::with_capacity(css.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == '/' && chars.get(i + 1) == Some(&'*') {
            let start = i;
            i += 2;
            while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                i += 1;
            }
            i = (i + 2).min(chars.len());
            out.extend(&chars[start..i]);
            continue;
        }
        if c == '"' || c == '\'' {
            let start = i;
            i += 1;
            while i < chars.len() && chars[i] != c {
                i += 1;
            }
            i = (i + 1).min(chars.len());
            out.extend(&chars[start..i]);
            continue;
        }

        let prev_is_ident = i > 0 && is_ident(chars[i - 1]);
        let next_starts_ident = chars.get(i + 1).copied().is_some_and(is_ident_start);
        if c == '.' && !prev_is_ident && next_starts_ident {
            let start = i + 1;
            let mut end = start;
            while end < chars.len() && is_ident(chars[end]) {
                end += 1;
            }
            let class: String = chars[start..end].iter().collect();
            out.push('.');
            out.push_str(&map(&class));
            i = end;
            continue;
        }

        out.push(c);
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSS: &str = ".card { padding: 0.5em; background: url(bg.png); }\n\
                       .card .title, .badge:hover { color: red; }\n\
                       /* .ignored */ @media (min-width: 10px) { .badge { margin: 1px; } }";

    #[test]
    fn hash_is_stable() {
        assert_eq!(stable_hash("abc"), stable_hash("abc"));
        assert_ne!(stable_hash("abc"), stable_hash("abd"));
        // blake3("") starts af1349b9f5f9a1a6
        assert_eq!(stable_hash(""), 0xa6a1_f9f5_b949_13af);
    }

    #[test]
    fn extracts_only_class_selectors() {
        let head = Node::element("head");
        let scope = StyleScope::new(head, "u");
        let classes = scope.scope(CSS);

        let names: Vec<&str> = classes.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["card", "title", "badge"]);
        assert!(classes["card"].starts_with("u-"));
        assert!(classes["card"].ends_with("-card"));
    }

    #[test]
    fn injects_once_per_distinct_text() {
        let head = Node::element("head");
        let scope = StyleScope::new(head.clone(), "u");

        let first = scope.scope(CSS);
        let second = scope.scope(CSS);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(head.child_count(), 1);

        scope.scope(".other { color: blue; }");
        assert_eq!(head.child_count(), 2);
        assert_eq!(scope.len(), 2);
    }

    #[test]
    fn injected_sheet_uses_scoped_names() {
        let head = Node::element("head");
        let scope = StyleScope::new(head.clone(), "x");
        let classes = scope.scope(".a { top: .5em } .b { content: '.c' }");

        let sheet = head.children()[0].text_content();
        assert!(sheet.contains(&format!(".{} ", classes["a"])));
        assert!(sheet.contains(".5em"));
        assert!(sheet.contains("'.c'"));
        assert!(!classes.contains_key("c"));
    }

    #[test]
    fn fresh_scope_has_fresh_cache() {
        let a = StyleScope::new(Node::element("head"), "u");
        let b = StyleScope::new(Node::element("head"), "u");
        a.scope(CSS);
        assert_eq!(a.len(), 1);
        assert!(b.is_empty());
    }
}
