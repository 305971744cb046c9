//! Ordered route table: compiles `{capture}` path templates into segment
//! lists and matches them against a decoded request path (§4.9).
//!
//! Matching walks the registered routes in insertion order and returns the
//! first whose method and segment shape (count + literal segments) match;
//! the chosen route's validator and action are then run by the dispatcher,
//! which falls through to the next shape-matching candidate when either
//! declines (see DESIGN.md for why validator/action rejection is folded
//! into candidate selection rather than terminating in a 400).

use crate::http::url::decode_path_segment;
use crate::http::{HttpMethod, MethodChoice};
use crate::http::request::Request;
use crate::http::response::Response;
use std::future::Future;
use std::pin::Pin;

pub type ActionFuture<'a> = Pin<Box<dyn Future<Output = bool> + Send + 'a>>;
pub type HttpAction = Box<dyn for<'a> Fn(&'a mut Request, &'a mut Response) -> ActionFuture<'a> + Send + Sync>;
pub type HttpValidate = Box<dyn Fn(&Request) -> bool + Send + Sync>;

pub fn always_valid() -> HttpValidate {
    Box::new(|_| true)
}

#[derive(Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Capture(String),
}

struct SegmentTemplate {
    segments: Vec<Segment>,
}

impl SegmentTemplate {
    fn parse(path: &str) -> Self {
        let trimmed = path.trim_start_matches('/');
        let segments = if trimmed.is_empty() {
            Vec::new()
        } else {
            trimmed
                .split('/')
                .map(|s| match s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                    Some(name) => Segment::Capture(name.to_string()),
                    None => Segment::Literal(s.to_string()),
                })
                .collect()
        };
        Self { segments }
    }

    /// Segment-count → literal match → capture bind, in that order
    /// (grounded in the original's `checkPathMatch`).
    fn try_match(&self, actual: &[&str]) -> Option<Vec<(String, String)>> {
        if self.segments.len() != actual.len() {
            return None;
        }
        let mut captures = Vec::new();
        for (template, value) in self.segments.iter().zip(actual) {
            match template {
                Segment::Literal(lit) => {
                    if lit != value {
                        return None;
                    }
                }
                Segment::Capture(name) => {
                    if value.is_empty() {
                        return None;
                    }
                    let decoded = decode_path_segment(value)?;
                    captures.push((name.clone(), decoded));
                }
            }
        }
        Some(captures)
    }
}

pub struct Route {
    method: MethodChoice,
    raw_path: String,
    template: SegmentTemplate,
    pub action: HttpAction,
    pub validator: HttpValidate,
}

pub struct Match<'a> {
    pub route: &'a Route,
    pub captures: Vec<(String, String)>,
}

#[derive(Default)]
pub struct PathMatcher {
    routes: Vec<Route>,
}

impl PathMatcher {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    pub fn add_path(
        &mut self,
        method: MethodChoice,
        path: &str,
        action: HttpAction,
        validator: HttpValidate,
    ) {
        self.routes.push(Route {
            method,
            raw_path: path.to_string(),
            template: SegmentTemplate::parse(path),
            action,
            validator,
        });
    }

    pub fn rem_path(&mut self, method: MethodChoice, path: &str) {
        self.routes
            .retain(|r| !(r.method == method && r.raw_path == path));
    }

    /// Every route whose method and segment shape match `path`, in
    /// insertion order — the dispatcher tries each until one's validator
    /// and action both accept.
    pub fn candidates<'a>(&'a self, method: HttpMethod, path: &str) -> Vec<Match<'a>> {
        let segments = split_path(path);
        self.routes
            .iter()
            .filter(|r| r.method.matches(method))
            .filter_map(|r| {
                r.template
                    .try_match(&segments)
                    .map(|captures| Match { route: r, captures })
            })
            .collect()
    }
}

fn split_path(path: &str) -> Vec<&str> {
    let trimmed = path.trim_start_matches('/');
    if trimmed.is_empty() {
        Vec::new()
    } else {
        trimmed.split('/').collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_action() -> HttpAction {
        Box::new(|_req, _res| Box::pin(async { true }))
    }

    #[test]
    fn root_path_matches_only_empty_template() {
        let mut matcher = PathMatcher::new();
        matcher.add_path(MethodChoice::All, "/", noop_action(), always_valid());
        assert_eq!(matcher.candidates(HttpMethod::Get, "/").len(), 1);
        assert_eq!(matcher.candidates(HttpMethod::Get, "/x").len(), 0);
    }

    #[test]
    fn literal_route_takes_precedence_by_insertion_order() {
        let mut matcher = PathMatcher::new();
        matcher.add_path(MethodChoice::Specific(HttpMethod::Get), "/a/b", noop_action(), always_valid());
        matcher.add_path(
            MethodChoice::Specific(HttpMethod::Get),
            "/a/{x}",
            noop_action(),
            always_valid(),
        );

        let candidates = matcher.candidates(HttpMethod::Get, "/a/b");
        assert_eq!(candidates.len(), 2);
        assert!(candidates[0].captures.is_empty());

        let candidates = matcher.candidates(HttpMethod::Get, "/a/c");
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].captures, vec![("x".to_string(), "c".to_string())]);
    }

    #[test]
    fn capture_does_not_match_empty_segment() {
        let mut matcher = PathMatcher::new();
        matcher.add_path(MethodChoice::All, "/items/{id}", noop_action(), always_valid());
        assert_eq!(matcher.candidates(HttpMethod::Get, "/items/").len(), 0);
    }

    #[test]
    fn unregistering_a_route_returns_no_future_matches() {
        let mut matcher = PathMatcher::new();
        matcher.add_path(MethodChoice::All, "/gone", noop_action(), always_valid());
        matcher.rem_path(MethodChoice::All, "/gone");
        assert_eq!(matcher.candidates(HttpMethod::Get, "/gone").len(), 0);
    }
}
