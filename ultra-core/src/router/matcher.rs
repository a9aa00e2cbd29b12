//! Route patterns and resolution.
//!
//! Patterns are made of literal segments and `:name` parameters. The exact
//! pattern `/*` is the wildcard fallback.
//!
//! Empty segments are dropped on both sides before comparing, so repeated
//! and trailing slashes are ignored and a parameter never binds to an empty
//! string: `/user/` does not match `/user/:id`.

use std::fmt;

use indexmap::IndexMap;
use smallvec::SmallVec;

/// Parameters bound by a match, in pattern order.
pub type Params = IndexMap<String, String>;

const WILDCARD: &str = "/*";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// A parsed route pattern.
#[derive(Clone, PartialEq, Eq)]
pub struct RoutePattern {
    raw: String,
    segments: Vec<Segment>,
}

fn segments(path: &str) -> SmallVec<[&str; 8]> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

impl RoutePattern {
    pub fn parse(pattern: &str) -> Self {
        let segments = segments(pattern)
            .into_iter()
            .map(|s| match s.strip_prefix(':') {
                Some(name) => Segment::Param(name.to_string()),
                None => Segment::Literal(s.to_string()),
            })
            .collect();
        Self {
            raw: pattern.to_string(),
            segments,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_wildcard(&self) -> bool {
        self.raw == WILDCARD
    }

    /// Match `path`, binding parameters.
    ///
    /// The wildcard matches everything with no parameters.
    pub fn matches(&self, path: &str) -> Option<Params> {
        if self.is_wildcard() || self.raw == path {
            return Some(Params::new());
        }

        let parts = segments(path);
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = Params::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(literal) if literal != part => return None,
                Segment::Literal(_) => {}
                Segment::Param(name) => {
                    params.insert(name.clone(), part.to_string());
                }
            }
        }
        Some(params)
    }
}

impl fmt::Debug for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RoutePattern({})", self.raw)
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Resolve `path` against `patterns` in table order.
///
/// The first non-wildcard match wins. A wildcard is remembered but does not
/// stop the scan; it is used only when nothing else matched, wherever it
/// sits in the table. Returns the index of the winning pattern.
pub fn resolve<'a, I>(patterns: I, path: &str) -> Option<(usize, Params)>
where
    I: IntoIterator<Item = &'a RoutePattern>,
{
    let mut fallback = None;
    for (index, pattern) in patterns.into_iter().enumerate() {
        if pattern.is_wildcard() {
            fallback.get_or_insert(index);
            continue;
        }
        if let Some(params) = pattern.matches(path) {
            return Some((index, params));
        }
    }
    fallback.map(|index| (index, Params::new()))
}
