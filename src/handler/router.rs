//! Default route table (§6 "Routing API exposed to handlers").
//!
//! This is an ordinary consumer of [`PathMatcher::add_path`] — nothing
//! here is special-cased by the dispatcher. A real deployment registers
//! its own routes the same way; these three exist to exercise the core
//! end to end (a plain response, a streamed echo showing chunked framing
//! on both sides, and static file serving).

use crate::handler::{responses, static_files};
use crate::http::request::Request;
use crate::http::response::Response;
use crate::http::status::HttpStatus;
use crate::http::MethodChoice;
use crate::routing::path_matcher::{always_valid, ActionFuture, PathMatcher};

pub fn register(matcher: &mut PathMatcher) {
    matcher.add_path(
        MethodChoice::Specific(crate::http::HttpMethod::Get),
        "/",
        Box::new(welcome),
        always_valid(),
    );

    matcher.add_path(
        MethodChoice::Specific(crate::http::HttpMethod::Post),
        "/echo",
        Box::new(echo),
        always_valid(),
    );

    matcher.add_path(
        MethodChoice::Specific(crate::http::HttpMethod::Get),
        "/static/{file}",
        Box::new(static_files::action),
        always_valid(),
    );
}

fn welcome<'a>(req: &'a mut Request, res: &'a mut Response) -> ActionFuture<'a> {
    Box::pin(async move {
        res.set_header("Content-Type", "text/html");
        let _ =
            crate::handler::middleware::send_compressed(req, res, responses::welcome_html()).await;
        true
    })
}

/// Copies the request body to the response body with chunked output
/// (§8 Scenario 2), reading and writing in fixed-size slices so neither
/// side has to buffer the whole body in memory.
fn echo<'a>(req: &'a mut Request, res: &'a mut Response) -> ActionFuture<'a> {
    Box::pin(async move {
        let mut buf = [0u8; 4096];
        loop {
            let n = match req.body().read(&mut buf).await {
                Ok(n) => n,
                Err(_) => {
                    responses::send_error(req, res, HttpStatus::InternalServerError).await;
                    return true;
                }
            };
            if n == 0 {
                break;
            }
            if res.write_chunked(&buf[..n]).await.is_err() {
                return true;
            }
        }
        true
    })
}
