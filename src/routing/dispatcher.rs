//! Per-connection request/response lifecycle (§4.10).
//!
//! Drives one connection through repeated request cycles: read head,
//! validate, match a route, run its validator and action, finalize the
//! response, drain the body, and decide keep-alive. Returns when the
//! connection should close.

use crate::config::config;
use crate::http::parser::{Parser, ParserOk};
use crate::http::request::Request;
use crate::http::response::Response;
use crate::http::status::HttpStatus;
use crate::http::validator::Validator;
use crate::net::context::Context;
use crate::routing::path_matcher::{ActionFuture, PathMatcher};
use async_std::io::ReadExt;
use async_std::net::TcpStream;
use std::any::Any;
use std::future::{poll_fn, Future};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::task::Poll;
use std::time::Duration;

enum ConnectionAction {
    KeepAlive,
    Close,
}

/// Per-connection request/response loop. `idle_timeout`, when set, bounds
/// how long the connection may sit between requests before it is torn
/// down (§5 "Cancellation and timeout": "Per-connection idle timeouts...
/// on expiry, the Store emits a `Remove` update for the descriptor" — the
/// `Remove` update here is enqueued by the caller once `serve` returns,
/// since the descriptor id lives in the [`Context`] the dispatcher is
/// handed, not in the dispatcher itself).
pub struct Dispatcher<'a> {
    matcher: &'a PathMatcher,
    idle_timeout: Option<Duration>,
}

impl<'a> Dispatcher<'a> {
    pub fn new(matcher: &'a PathMatcher, idle_timeout: Option<Duration>) -> Self {
        Self { matcher, idle_timeout }
    }

    /// Serves requests on `stream` until the peer closes, a framing error
    /// or `Connection: close` ends the connection, or the idle timeout
    /// between requests elapses.
    pub async fn serve(&self, stream: TcpStream, context: Arc<Context>) {
        loop {
            match self.serve_one(stream.clone(), context.clone()).await {
                ConnectionAction::KeepAlive => continue,
                ConnectionAction::Close => break,
            }
        }
    }

    async fn serve_one(&self, mut stream: TcpStream, context: Arc<Context>) -> ConnectionAction {
        let mut parser = Parser::new();
        let mut req = Request::empty();
        let mut buf = vec![0u8; config().buffer_size];
        let mut any_bytes_seen = false;

        // Re-parses whatever is already buffered on every iteration instead
        // of gating the socket read on `parser.is_buffer_empty()`: a
        // fragmented request line or header line leaves the parser holding
        // un-consumed bytes (`buf_len>0`) while still reporting `Incomplete`,
        // and gating the read on an empty buffer would spin calling
        // `parser.feed(&[], ..)` forever without ever reading more from the
        // socket (§8 Scenario 6 forbids exactly this busy-loop).
        let head_outcome = loop {
            let outcome = match parser.feed(&[], &mut req) {
                Ok(ParserOk::Incomplete) => {
                    // Only the wait for the *next* request's first byte is
                    // bounded by the idle timeout; once a request is under
                    // way a slow peer is a framing concern, not an idle one
                    // (§8 Scenario 6: suspending on a trickling peer mid-body
                    // must not be torn down as idle).
                    let read_result = match (self.idle_timeout, any_bytes_seen) {
                        (Some(timeout), false) => {
                            async_std::io::timeout(timeout, stream.read(&mut buf)).await
                        }
                        _ => stream.read(&mut buf).await,
                    };
                    match read_result {
                        Ok(0) => break Err(None),
                        Ok(n) => {
                            any_bytes_seen = true;
                            match parser.feed(&buf[..n], &mut req) {
                                Ok(o) => o,
                                Err(e) => break Err(Some(e)),
                            }
                        }
                        Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                        Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                            log::debug!("connection idle timeout elapsed");
                            break Err(None);
                        }
                        Err(e) => {
                            log::debug!("read error on connection: {e}");
                            break Err(None);
                        }
                    }
                }
                Ok(o) => o,
                Err(e) => break Err(Some(e)),
            };

            match outcome {
                ParserOk::HeadersDone | ParserOk::Done => break Ok(()),
                ParserOk::Incomplete | ParserOk::Ok => continue,
            }
        };

        match head_outcome {
            Err(None) => return ConnectionAction::Close,
            Err(Some(err)) => {
                if any_bytes_seen {
                    let mut response = Response::new(stream.clone(), req.version);
                    response.status = err.into_http_status();
                    let _ = response.send(err.into_http_status().reason_phrase().as_bytes()).await;
                }
                return ConnectionAction::Close;
            }
            Ok(()) => {}
        }

        if let Err(err) = Validator::validate_request(&req) {
            let mut response = Response::new(stream.clone(), req.version);
            response.status = err.into_http_status();
            let _ = response.send(err.into_http_status().reason_phrase().as_bytes()).await;
            return ConnectionAction::Close;
        }

        let framing = parser.framing(req.method);
        let leftover = parser.take_leftover();
        let body_reader =
            crate::http::stream_codec::BodyReader::new(stream.clone(), framing, leftover);
        req.attach_body(body_reader);
        req.attach_context(context);

        for (key, value) in req.url.query_pairs() {
            req.variables
                .insert_or_assign(key.to_string(), value.to_string());
        }

        let mut response = Response::new(stream.clone(), req.version);
        let candidates = self.matcher.candidates(req.method, req.url.pathname().to_string().as_str());

        let mut dispatched = false;
        for candidate in candidates {
            for (key, value) in &candidate.captures {
                req.variables.insert_or_assign(key.clone(), value.clone());
            }

            if is_form_urlencoded(&req) {
                if let Ok(body) = read_body_to_end(&mut req).await {
                    for (key, value) in crate::http::url::decode_query(&String::from_utf8_lossy(&body))
                    {
                        req.variables.insert_or_assign(key, value);
                    }
                }
            }

            if !(candidate.route.validator)(&req) {
                continue;
            }

            let action_future = (candidate.route.action)(&mut req, &mut response);
            match run_action_catching_panics(action_future).await {
                Ok(true) => {
                    dispatched = true;
                    break;
                }
                Ok(false) => continue,
                Err(payload) => {
                    // §4.10 / §7: a panicking handler translates to 500 and
                    // a closed connection, never an aborted task with no
                    // response at all.
                    log::error!("handler panicked: {}", panic_payload_message(&payload));
                    if !response.headers_sent() {
                        response.status = HttpStatus::InternalServerError;
                        let _ = response.send(b"Internal Server Error").await;
                    }
                    return ConnectionAction::Close;
                }
            }
        }

        if !dispatched {
            response.status = HttpStatus::NotFound;
            let body = b"Not Found";
            let _ = response.send(body).await;
        } else {
            let _ = response.finish().await;
        }

        let _ = req.body().drain().await;

        if self.should_keep_alive(&req) {
            ConnectionAction::KeepAlive
        } else {
            ConnectionAction::Close
        }
    }

    fn should_keep_alive(&self, req: &Request) -> bool {
        let connection = req.headers.get("Connection").map(str::to_ascii_lowercase);
        match req.version {
            crate::http::HttpVersion::V1_0 => connection.as_deref() == Some("keep-alive"),
            _ => connection.as_deref() != Some("close"),
        }
    }
}

/// Polls a route action to completion, converting a panic raised inside it
/// into `Err` instead of unwinding through the connection task (§4.10:
/// "Handler exceptions/panics ... translate to a 500 response and `Done`").
/// `catch_unwind` only wraps a synchronous closure, so each poll of the
/// action's future is individually wrapped — the same `panic::catch_unwind`
/// + `AssertUnwindSafe` boundary the pack uses around handler dispatch (see
/// `denoland-deno`'s `lsp/dispatch.rs`), adapted here to drive an async
/// action instead of calling a synchronous one.
async fn run_action_catching_panics(
    mut fut: ActionFuture<'_>,
) -> Result<bool, Box<dyn Any + Send>> {
    poll_fn(move |cx| match panic::catch_unwind(AssertUnwindSafe(|| fut.as_mut().poll(cx))) {
        Ok(poll) => poll.map(Ok),
        Err(payload) => Poll::Ready(Err(payload)),
    })
    .await
}

fn panic_payload_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

fn is_form_urlencoded(req: &Request) -> bool {
    req.headers
        .get("Content-Type")
        .map(|v| {
            v.split(';')
                .next()
                .unwrap_or("")
                .trim()
                .eq_ignore_ascii_case("application/x-www-form-urlencoded")
        })
        .unwrap_or(false)
}

async fn read_body_to_end(req: &mut Request) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = req.body().read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        out.extend_from_slice(&chunk[..n]);
    }
    Ok(out)
}
