//! Streaming body framing on top of the raw socket byte stream (§4.6).
//!
//! `BodyReader` decodes an incoming body according to the framing decision
//! made by [`HttpParser`](crate::http::parser::Parser) (length-delimited,
//! chunked, or none). `BodyWriter` is the symmetric encoder for outgoing
//! responses. Both operate directly on an `async-std` `TcpStream` handle
//! (a cheap clone of the connection's socket, per `TcpStream::clone`) so a
//! request's reader and a response's writer can be driven independently
//! without fighting over a single `&mut` borrow.
//!
//! Chunk size framing is hex, lowercase, no leading zeros except for the
//! terminator; the internal buffer is 1024 bytes, matching
//! `original_source/NisseHTTP/StreamOutput.h`'s `chunkBufferSize`.

use crate::http::headers::HeaderMap;
use async_std::io::{Read, ReadExt, Write, WriteExt};
use async_std::net::TcpStream;
use std::io;

const CHUNK_BUFFER_SIZE: usize = 1024;
const RAW_READ_SIZE: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    Length(u64),
    Chunked,
    None,
}

#[derive(PartialEq, Eq)]
enum ChunkPhase {
    Size,
    Data,
    TrailingCrlf,
    Trailers,
    Done,
}

/// Decodes a request or response body from a raw socket byte stream.
pub struct BodyReader {
    stream: TcpStream,
    raw: Vec<u8>,
    raw_pos: usize,
    framing: Framing,
    length_remaining: u64,
    chunk_remaining: u64,
    chunk_phase: ChunkPhase,
    eof: bool,
    trailers: HeaderMap,
    replay: Option<(Vec<u8>, usize)>,
}

impl BodyReader {
    /// `leftover` is any bytes already pulled off the wire while parsing
    /// headers that belong to the body.
    pub fn new(stream: TcpStream, framing: Framing, leftover: Vec<u8>) -> Self {
        let length_remaining = match framing {
            Framing::Length(n) => n,
            _ => 0,
        };
        let eof = matches!(framing, Framing::None) || matches!(framing, Framing::Length(0));
        Self {
            stream,
            raw: leftover,
            raw_pos: 0,
            framing,
            length_remaining,
            chunk_remaining: 0,
            chunk_phase: ChunkPhase::Size,
            eof,
            trailers: HeaderMap::new(),
            replay: None,
        }
    }

    pub fn trailers(&self) -> &HeaderMap {
        &self.trailers
    }

    pub fn is_eof(&self) -> bool {
        self.eof
    }

    async fn fetch_raw(&mut self) -> io::Result<bool> {
        if self.raw_pos == self.raw.len() {
            self.raw.clear();
            self.raw_pos = 0;
        } else if self.raw_pos > 0 {
            self.raw.copy_within(self.raw_pos.., 0);
            self.raw.truncate(self.raw.len() - self.raw_pos);
            self.raw_pos = 0;
        }
        let mut chunk = [0u8; RAW_READ_SIZE];
        let n = self.stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(false);
        }
        self.raw.extend_from_slice(&chunk[..n]);
        Ok(true)
    }

    fn find_crlf(&self) -> Option<usize> {
        self.raw[self.raw_pos..]
            .windows(2)
            .position(|w| w == b"\r\n")
    }

    /// Reads up to `buf.len()` bytes. Returns `Ok(0)` at end-of-stream,
    /// idempotently on subsequent calls (§4.6 invariant).
    pub async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some((data, pos)) = &mut self.replay {
            if *pos < data.len() {
                let n = std::cmp::min(buf.len(), data.len() - *pos);
                buf[..n].copy_from_slice(&data[*pos..*pos + n]);
                *pos += n;
                return Ok(n);
            }
            return Ok(0);
        }

        match self.framing {
            Framing::None => Ok(0),
            Framing::Length(_) => self.read_length(buf).await,
            Framing::Chunked => self.read_chunked(buf).await,
        }
    }

    async fn read_length(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.length_remaining == 0 {
            self.eof = true;
            return Ok(0);
        }
        if self.raw_pos == self.raw.len() {
            if !self.fetch_raw().await? {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed before Content-Length was satisfied",
                ));
            }
        }
        let available = self.raw.len() - self.raw_pos;
        let n = std::cmp::min(buf.len(), std::cmp::min(available, self.length_remaining as usize));
        buf[..n].copy_from_slice(&self.raw[self.raw_pos..self.raw_pos + n]);
        self.raw_pos += n;
        self.length_remaining -= n as u64;
        if self.length_remaining == 0 {
            self.eof = true;
        }
        Ok(n)
    }

    async fn read_chunked(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            match self.chunk_phase {
                ChunkPhase::Size => {
                    while self.find_crlf().is_none() {
                        if !self.fetch_raw().await? {
                            return Err(io::Error::new(
                                io::ErrorKind::UnexpectedEof,
                                "connection closed mid chunk-size line",
                            ));
                        }
                    }
                    let idx = self.find_crlf().unwrap();
                    let line = &self.raw[self.raw_pos..self.raw_pos + idx];
                    let size_str = std::str::from_utf8(line)
                        .ok()
                        .and_then(|s| s.split(';').next())
                        .map(str::trim)
                        .ok_or_else(|| invalid_chunk("non-utf8 chunk size"))?;
                    let size = u64::from_str_radix(size_str, 16)
                        .map_err(|_| invalid_chunk("malformed chunk size"))?;
                    self.raw_pos += idx + 2;
                    self.chunk_remaining = size;
                    self.chunk_phase = if size == 0 {
                        ChunkPhase::Trailers
                    } else {
                        ChunkPhase::Data
                    };
                }
                ChunkPhase::Data => {
                    if self.raw_pos == self.raw.len() {
                        if !self.fetch_raw().await? {
                            return Err(io::Error::new(
                                io::ErrorKind::UnexpectedEof,
                                "connection closed mid chunk data",
                            ));
                        }
                    }
                    let available = self.raw.len() - self.raw_pos;
                    let n = std::cmp::min(
                        buf.len(),
                        std::cmp::min(available, self.chunk_remaining as usize),
                    );
                    buf[..n].copy_from_slice(&self.raw[self.raw_pos..self.raw_pos + n]);
                    self.raw_pos += n;
                    self.chunk_remaining -= n as u64;
                    if self.chunk_remaining == 0 {
                        self.chunk_phase = ChunkPhase::TrailingCrlf;
                    }
                    return Ok(n);
                }
                ChunkPhase::TrailingCrlf => {
                    while self.raw.len() - self.raw_pos < 2 {
                        if !self.fetch_raw().await? {
                            return Err(io::Error::new(
                                io::ErrorKind::UnexpectedEof,
                                "connection closed mid chunk terminator",
                            ));
                        }
                    }
                    self.raw_pos += 2;
                    self.chunk_phase = ChunkPhase::Size;
                }
                ChunkPhase::Trailers => {
                    loop {
                        while self.find_crlf().is_none() {
                            if !self.fetch_raw().await? {
                                return Err(io::Error::new(
                                    io::ErrorKind::UnexpectedEof,
                                    "connection closed mid trailers",
                                ));
                            }
                        }
                        let idx = self.find_crlf().unwrap();
                        if idx == 0 {
                            self.raw_pos += 2;
                            break;
                        }
                        let line = self.raw[self.raw_pos..self.raw_pos + idx].to_vec();
                        self.raw_pos += idx + 2;
                        if let Some((name, value)) = split_header_line(&line) {
                            self.trailers.add_comma_split(&name, &value);
                        }
                    }
                    self.chunk_phase = ChunkPhase::Done;
                    self.eof = true;
                    return Ok(0);
                }
                ChunkPhase::Done => return Ok(0),
            }
        }
    }

    /// Drains currently-buffered and remaining body bytes into an internal
    /// cache and returns a view of them, without consuming the body for a
    /// subsequent handler read — used by signature validators that must
    /// hash the raw body (§4.6).
    pub async fn preload_into_buffer(&mut self) -> io::Result<&[u8]> {
        if self.replay.is_none() {
            let mut data = Vec::new();
            let mut chunk = [0u8; RAW_READ_SIZE];
            loop {
                let n = self.read(&mut chunk).await?;
                if n == 0 {
                    break;
                }
                data.extend_from_slice(&chunk[..n]);
            }
            self.replay = Some((data, 0));
        }
        let (data, pos) = self.replay.as_ref().unwrap();
        Ok(&data[*pos..])
    }

    /// Discards any unread body bytes so framing stays aligned for the
    /// next pipelined request (§4.10 step 8). A no-op once already drained.
    pub async fn drain(&mut self) -> io::Result<()> {
        let mut scratch = [0u8; RAW_READ_SIZE];
        loop {
            let n = self.read(&mut scratch).await?;
            if n == 0 {
                break;
            }
        }
        Ok(())
    }
}

fn invalid_chunk(msg: &'static str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

fn split_header_line(line: &[u8]) -> Option<(String, String)> {
    let line = std::str::from_utf8(line).ok()?;
    let (name, value) = line.split_once(':')?;
    Some((name.trim().to_string(), value.trim().to_string()))
}

/// Encodes an outgoing body according to the response's framing decision.
pub struct BodyWriter {
    stream: TcpStream,
    framing: Framing,
    remaining: u64,
    finished: bool,
    prologue: Option<Vec<u8>>,
}

impl BodyWriter {
    pub fn new(stream: TcpStream, framing: Framing, prologue: Vec<u8>) -> Self {
        let remaining = match framing {
            Framing::Length(n) => n,
            _ => 0,
        };
        Self {
            stream,
            framing,
            remaining,
            finished: false,
            prologue: Some(prologue),
        }
    }

    async fn flush_prologue(&mut self) -> io::Result<()> {
        if let Some(p) = self.prologue.take() {
            self.stream.write_all(&p).await?;
        }
        Ok(())
    }

    pub fn has_sent_prologue(&self) -> bool {
        self.prologue.is_none()
    }

    /// Writes `data`, splitting it into `CHUNK_BUFFER_SIZE` frames for
    /// chunked framing. Errors if a length-delimited write would exceed the
    /// declared `Content-Length`.
    pub async fn write(&mut self, data: &[u8]) -> io::Result<()> {
        self.flush_prologue().await?;
        match self.framing {
            Framing::Length(_) => {
                if data.len() as u64 > self.remaining {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "write exceeds declared Content-Length",
                    ));
                }
                self.stream.write_all(data).await?;
                self.remaining -= data.len() as u64;
            }
            Framing::Chunked => {
                for frame in data.chunks(CHUNK_BUFFER_SIZE) {
                    let size_line = format!("{:x}\r\n", frame.len());
                    self.stream.write_all(size_line.as_bytes()).await?;
                    self.stream.write_all(frame).await?;
                    self.stream.write_all(b"\r\n").await?;
                }
            }
            Framing::None => {
                if !data.is_empty() {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "write attempted on a bodyless response",
                    ));
                }
            }
        }
        Ok(())
    }

    /// Finalizes the body: for chunked framing, emits the zero-size
    /// terminator; for length-delimited framing, errors if fewer than
    /// `Content-Length` bytes were written. Idempotent.
    pub async fn finish(&mut self) -> io::Result<()> {
        if self.finished {
            return Ok(());
        }
        self.flush_prologue().await?;
        match self.framing {
            Framing::Length(_) => {
                if self.remaining != 0 {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "response body shorter than declared Content-Length",
                    ));
                }
            }
            Framing::Chunked => {
                self.stream.write_all(b"0\r\n\r\n").await?;
            }
            Framing::None => {}
        }
        self.finished = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_std::net::{TcpListener, TcpStream};
    use async_std::task;

    async fn socket_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accept = task::spawn(async move { listener.accept().await.unwrap().0 });
        let client = TcpStream::connect(addr).await.unwrap();
        let server = accept.await;
        (client, server)
    }

    #[async_std::test]
    async fn length_delimited_read_returns_eof_on_zero() {
        let (_client, server) = socket_pair().await;
        let mut reader = BodyReader::new(server, Framing::Length(0), Vec::new());
        let mut buf = [0u8; 16];
        assert_eq!(reader.read(&mut buf).await.unwrap(), 0);
        assert!(reader.is_eof());
    }

    #[async_std::test]
    async fn chunked_read_decodes_multiple_chunks() {
        let (mut client, server) = socket_pair().await;
        let writer = task::spawn(async move {
            client.write_all(b"3\r\nabc\r\n5\r\ndefgh\r\n0\r\n\r\n").await.unwrap();
        });
        let mut reader = BodyReader::new(server, Framing::Chunked, Vec::new());
        let mut out = Vec::new();
        let mut buf = [0u8; 4];
        loop {
            let n = reader.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        writer.await;
        assert_eq!(out, b"abcdefgh");
        assert!(reader.trailers().get("x-none").is_none());
    }

    #[async_std::test]
    async fn chunked_terminator_only_is_immediate_eof_with_empty_trailers() {
        let (mut client, server) = socket_pair().await;
        let writer = task::spawn(async move {
            client.write_all(b"0\r\n\r\n").await.unwrap();
        });
        let mut reader = BodyReader::new(server, Framing::Chunked, Vec::new());
        let mut buf = [0u8; 16];
        assert_eq!(reader.read(&mut buf).await.unwrap(), 0);
        writer.await;
        assert_eq!(reader.trailers().iter().count(), 0);
    }

    #[async_std::test]
    async fn chunked_write_then_read_round_trips() {
        let (client, server) = socket_pair().await;
        let mut writer = BodyWriter::new(client, Framing::Chunked, Vec::new());
        let write_task = task::spawn(async move {
            writer.write(b"hello ").await.unwrap();
            writer.write(b"world").await.unwrap();
            writer.finish().await.unwrap();
        });
        let mut reader = BodyReader::new(server, Framing::Chunked, Vec::new());
        let mut out = Vec::new();
        let mut buf = [0u8; 8];
        loop {
            let n = reader.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        write_task.await;
        assert_eq!(out, b"hello world");
    }

    #[async_std::test]
    async fn length_write_rejects_overrun() {
        let (client, _server) = socket_pair().await;
        let mut writer = BodyWriter::new(client, Framing::Length(3), Vec::new());
        assert!(writer.write(b"toolong").await.is_err());
    }
}
