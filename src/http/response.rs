//! The response object a route's action writes to.
//!
//! Mutable, append-only (§3 Data model): status is settable before the
//! first byte is emitted, headers accumulate, and the body stream is
//! either a whole-buffer [`Response::send`] (`Content-Length` framing) or
//! an incrementally written [`Response::write_chunked`] body. Header
//! emission happens lazily, exactly once, on whichever of those comes
//! first. A Rust `Drop` cannot run async I/O, so the "at destruction"
//! case from the original design note is implemented instead as the
//! dispatcher always calling [`Response::finish`] before a `Response` goes
//! out of scope (see DESIGN.md).

use crate::config::config;
use crate::http::headers::HeaderMap;
use crate::http::status::HttpStatus;
use crate::http::stream_codec::{BodyWriter, Framing};
use crate::http::HttpVersion;
use async_std::io::WriteExt;
use async_std::net::TcpStream;
use std::io;
use std::time::SystemTime;

/// Polymorphic header-emit target (Design Notes §9): a response either
/// owns a freshly built header set, or passes through an upstream
/// server's headers verbatim (used when acting as a reverse proxy).
pub enum ResponseHeaders {
    Own(HeaderMap),
    PassThrough(HeaderMap),
}

impl ResponseHeaders {
    fn map(&self) -> &HeaderMap {
        match self {
            ResponseHeaders::Own(h) | ResponseHeaders::PassThrough(h) => h,
        }
    }

    fn map_mut(&mut self) -> &mut HeaderMap {
        match self {
            ResponseHeaders::Own(h) | ResponseHeaders::PassThrough(h) => h,
        }
    }
}

pub struct Response {
    pub status: HttpStatus,
    version: HttpVersion,
    headers: ResponseHeaders,
    stream: TcpStream,
    writer: Option<BodyWriter>,
    headers_sent: bool,
}

impl Response {
    pub fn new(stream: TcpStream, version: HttpVersion) -> Self {
        let mut headers = HeaderMap::new();
        headers.set("Server", &config().server_name);
        headers.set("Date", &httpdate::fmt_http_date(SystemTime::now()));
        Self {
            status: HttpStatus::Ok,
            version,
            headers: ResponseHeaders::Own(headers),
            stream,
            writer: None,
            headers_sent: false,
        }
    }

    pub fn set_header(&mut self, name: &str, value: &str) {
        self.headers.map_mut().set(name, value);
    }

    pub fn headers(&self) -> &HeaderMap {
        self.headers.map()
    }

    /// Switches to an upstream response's header set, emitted verbatim
    /// instead of the locally built one (Design Notes §9).
    pub fn use_pass_through(&mut self, headers: HeaderMap) {
        self.headers = ResponseHeaders::PassThrough(headers);
    }

    pub fn headers_sent(&self) -> bool {
        self.headers_sent
    }

    fn render_prologue(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(
            format!(
                "{} {} {}\r\n",
                self.version.as_str(),
                self.status.code(),
                self.status.reason_phrase()
            )
            .as_bytes(),
        );
        out.extend_from_slice(self.headers.map().stringify().as_bytes());
        out.extend_from_slice(b"\r\n");
        out
    }

    /// Sends a complete, in-memory body with `Content-Length` framing.
    /// Emits the status line and headers as part of the same lazy flush.
    pub async fn send(&mut self, body: &[u8]) -> io::Result<()> {
        self.set_header("Content-Length", &body.len().to_string());
        let prologue = self.render_prologue();
        let mut writer = BodyWriter::new(
            self.stream.clone(),
            Framing::Length(body.len() as u64),
            prologue,
        );
        writer.write(body).await?;
        writer.finish().await?;
        self.headers_sent = true;
        Ok(())
    }

    /// Writes one chunk of a `Transfer-Encoding: chunked` body. May be
    /// called repeatedly; the prologue (with `Transfer-Encoding: chunked`
    /// set) is emitted lazily on the first call.
    pub async fn write_chunked(&mut self, data: &[u8]) -> io::Result<()> {
        if self.writer.is_none() {
            self.set_header("Transfer-Encoding", "chunked");
            let prologue = self.render_prologue();
            self.writer = Some(BodyWriter::new(self.stream.clone(), Framing::Chunked, prologue));
            self.headers_sent = true;
        }
        self.writer.as_mut().unwrap().write(data).await
    }

    /// Finalizes the response: closes the chunked terminator if a chunked
    /// body was started, or — if nothing was ever written — emits a bare
    /// `Content-Length: 0` response. Idempotent.
    pub async fn finish(&mut self) -> io::Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            return writer.finish().await;
        }
        if !self.headers_sent {
            self.set_header("Content-Length", "0");
            let prologue = self.render_prologue();
            self.stream.write_all(&prologue).await?;
            self.headers_sent = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_std::net::{TcpListener, TcpStream as AsyncTcpStream};
    use async_std::prelude::*;
    use async_std::task;
    use std::sync::Once;

    static INIT: Once = Once::new();

    fn setup() {
        INIT.call_once(|| {
            crate::config::set_config(crate::config::ServerConfig::default());
        });
    }

    async fn socket_pair() -> (AsyncTcpStream, AsyncTcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accept = task::spawn(async move { listener.accept().await.unwrap().0 });
        let client = AsyncTcpStream::connect(addr).await.unwrap();
        let server = accept.await;
        (client, server)
    }

    #[async_std::test]
    async fn send_emits_status_line_and_content_length() {
        setup();
        let (mut client, server) = socket_pair().await;
        let mut response = Response::new(server, HttpVersion::V1_1);
        response.send(b"hello").await.unwrap();

        let mut buf = vec![0u8; 512];
        let n = client.read(&mut buf).await.unwrap();
        let text = String::from_utf8_lossy(&buf[..n]);
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Length: 5\r\n"));
        assert!(text.ends_with("hello"));
    }

    #[async_std::test]
    async fn finish_without_writes_sends_empty_body() {
        setup();
        let (mut client, server) = socket_pair().await;
        let mut response = Response::new(server, HttpVersion::V1_1);
        response.status = HttpStatus::NoContent;
        response.finish().await.unwrap();

        let mut buf = vec![0u8; 512];
        let n = client.read(&mut buf).await.unwrap();
        let text = String::from_utf8_lossy(&buf[..n]);
        assert!(text.starts_with("HTTP/1.1 204 No Content\r\n"));
        assert!(text.ends_with("Content-Length: 0\r\n\r\n"));
    }
}
