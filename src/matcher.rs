//! Path matching.
//!
//! A path template is a sequence of segments, each either a literal or a
//! `{name}` placeholder capturing exactly one non-empty segment. A trailing
//! slash is a literal empty segment, so `/a/b` and `/a/b/` are distinct
//! routes. Matching is first-in-declaration-order, never most-specific.

use crate::config::RouteDefinition;
use std::collections::HashMap;

/// A compiled path template.
#[derive(Debug, Clone)]
pub struct PathTemplate {
    segments: Vec<Segment>,
}

#[derive(Debug, Clone)]
enum Segment {
    Literal(String),
    Param(String),
}

impl PathTemplate {
    /// Compile a template string like `/users/{id}/chats`.
    pub fn parse(template: &str) -> Self {
        let segments = split_segments(template)
            .map(|seg| {
                if seg.len() >= 2 && seg.starts_with('{') && seg.ends_with('}') {
                    Segment::Param(seg[1..seg.len() - 1].to_string())
                } else {
                    Segment::Literal(seg.to_string())
                }
            })
            .collect();
        Self { segments }
    }

    /// Match a concrete request path, returning captured bindings.
    pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let path_segments: Vec<&str> = split_segments(path).collect();
        if path_segments.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (segment, actual) in self.segments.iter().zip(&path_segments) {
            match segment {
                Segment::Literal(literal) => {
                    if literal != actual {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    // Placeholders never match an empty segment.
                    if actual.is_empty() {
                        return None;
                    }
                    params.insert(name.clone(), (*actual).to_string());
                }
            }
        }
        Some(params)
    }
}

/// Segments after the leading slash. A trailing slash yields a final empty
/// segment, which is what makes `/x` and `/x/` distinct.
fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    path.strip_prefix('/').unwrap_or(path).split('/')
}

/// Route matcher: compiled templates parallel to the route list.
pub struct RouteMatcher {
    templates: Vec<PathTemplate>,
}

/// Result of a successful route match.
#[derive(Debug)]
pub struct RouteMatch<'a> {
    /// Position in the route list (also indexes parallel tables).
    pub index: usize,
    pub route: &'a RouteDefinition,
    pub path_params: HashMap<String, String>,
}

impl RouteMatcher {
    pub fn new(routes: &[RouteDefinition]) -> Self {
        let templates = routes
            .iter()
            .map(|route| PathTemplate::parse(&route.path))
            .collect();
        Self { templates }
    }

    /// First route whose template matches, in declaration order.
    pub fn find<'a>(
        &self,
        routes: &'a [RouteDefinition],
        path: &str,
    ) -> Option<RouteMatch<'a>> {
        for (index, (template, route)) in self.templates.iter().zip(routes).enumerate() {
            if let Some(path_params) = template.matches(path) {
                return Some(RouteMatch {
                    index,
                    route,
                    path_params,
                });
            }
        }
        None
    }
}
