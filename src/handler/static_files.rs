//! Serves files under the configured static-files root at `GET
//! /static/{file}`.
//!
//! Registered as an ordinary route action (§6), not a special case in the
//! dispatcher. Files are read synchronously: `Context::is_feature_enabled
//! (Feature::FileReadWriteEvent)` is always `false` in this crate (§9
//! Design Notes, Open Question 3 — epoll never reports READ/WRITE
//! readiness for regular files), so there is no readiness-driven path to
//! suspend on here the way a socket read suspends a task.

use std::fs;
use std::io;

use crate::config::config;
use crate::http::request::Request;
use crate::http::response::Response;
use crate::http::status::HttpStatus;
use crate::net::context::Feature;
use crate::routing::path_matcher::ActionFuture;

pub fn action<'a>(req: &'a mut Request, res: &'a mut Response) -> ActionFuture<'a> {
    Box::pin(async move {
        debug_assert!(!req.context().is_feature_enabled(Feature::FileReadWriteEvent));

        let requested = req.variables.get("file").unwrap_or("").to_string();
        if !is_safe_segment(&requested) {
            crate::handler::responses::send_error(req, res, HttpStatus::Forbidden).await;
            return true;
        }

        let full_path = format!("{}/{}", config().static_files_root, requested);
        match fs::read(&full_path) {
            Ok(body) => {
                res.set_header("Content-Type", guess_mime(&full_path));
                let _ = crate::handler::middleware::send_compressed(req, res, body).await;
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                crate::handler::responses::send_error(req, res, HttpStatus::NotFound).await;
            }
            Err(_) => {
                crate::handler::responses::send_error(req, res, HttpStatus::InternalServerError)
                    .await;
            }
        }
        true
    })
}

/// A single path-template capture segment can't itself contain `/`, but
/// it can still be `..` or carry an embedded separator on some platforms
/// — reject both rather than trust the captured text as a bare path
/// component.
fn is_safe_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != ".."
        && !segment.contains('/')
        && !segment.contains('\\')
}

fn guess_mime(path: &str) -> &'static str {
    match path.rsplit('.').next() {
        Some("htm") | Some("html") => "text/html",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("json") => "application/json",
        Some("xml") => "application/xml",
        Some("txt") => "text/plain",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_parent_directory_segment() {
        assert!(!is_safe_segment(".."));
    }

    #[test]
    fn rejects_embedded_separators() {
        assert!(!is_safe_segment("a/b"));
        assert!(!is_safe_segment("a\\b"));
    }

    #[test]
    fn accepts_ordinary_filename() {
        assert!(is_safe_segment("logo.png"));
    }

    #[test]
    fn mime_guess_covers_common_types() {
        assert_eq!(guess_mime("a.html"), "text/html");
        assert_eq!(guess_mime("a.unknownext"), "application/octet-stream");
    }
}
