pub mod middleware;
pub mod responses;
mod router;
mod static_files;

use crate::routing::path_matcher::PathMatcher;

/// Builds the default route table served by [`crate::net::server::Server`].
pub fn build_routes() -> PathMatcher {
    let mut matcher = PathMatcher::new();
    router::register(&mut matcher);
    matcher
}
