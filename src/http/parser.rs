/*!
A finite-state machine parser for HTTP request serialization
([`Request`]).

The request line and header block are parsed incrementally from an
internal buffer fed by [`Parser::feed`]; each stage yields either a
[`ParserOk`] status or a [`ParserError`]. Unlike a body-buffering parser,
this one stops at [`ParserOk::HeadersDone`] — the body is not accumulated
here. Once headers are done, the caller decides body framing via
[`Parser::framing`] and hands any bytes already pulled past the header
block (via [`Parser::take_leftover`]) to a
[`BodyReader`](crate::http::stream_codec::BodyReader) constructed directly
on the socket.

As in a compiler, the parser only checks for syntactic errors; semantic
validation (version support, body-size limits) is left to the caller.
*/

use crate::config::config;
use crate::http::request::Request;
use crate::http::status::HttpStatus;
use crate::http::stream_codec::Framing;
use crate::http::url::Url;
use crate::http::*;

/// Capacity of the internal parser buffer.
/// Its value should be the same as the server read [`buffer capacity`](crate::config::ServerConfig::buffer_size)
const PARSER_BUF_CAP: usize = 4096;

#[derive(PartialEq, PartialOrd)]
enum ParserState {
    RequestLine,
    Headers,
    Done,
}

pub struct Parser {
    buf: [u8; PARSER_BUF_CAP],
    buf_len: usize,
    state: ParserState,

    headers_bytes_parsed: usize,
    last_header: Option<String>,
    content_length: Option<u64>,
    transfer_encoding_chunked: bool,
}

#[derive(PartialEq, Debug)]
pub enum ParserOk {
    /// Parsing completed successfully for the current stage.
    Ok,

    /// More data is required to complete the current field.
    Incomplete,

    /// Headers have been fully parsed and can be validated.
    HeadersDone,

    /// The full request head (line + headers) has been parsed.
    Done,
}

#[derive(thiserror::Error, PartialEq, Debug)]
pub enum ParserError {
    #[error("malformed request")]
    Error,

    /// Limit can be found in the server [`config`](crate::config::ServerConfig::max_uri_size)
    #[error("request-target exceeds configured limit")]
    TooLongUri,

    /// `Content-Length` and `Transfer-Encoding: chunked` both present, or
    /// `Content-Length` repeated with conflicting values (§4.7).
    #[error("conflicting body-framing headers")]
    ConflictingFraming,
}

impl ParserError {
    pub fn into_http_status(&self) -> HttpStatus {
        match self {
            ParserError::Error => HttpStatus::BadRequest,
            ParserError::TooLongUri => HttpStatus::UriTooLong,
            ParserError::ConflictingFraming => HttpStatus::BadRequest,
        }
    }
}

impl Parser {
    pub fn new() -> Self {
        Self {
            buf: [0; PARSER_BUF_CAP],
            buf_len: 0,
            state: ParserState::RequestLine,
            headers_bytes_parsed: 0,
            last_header: None,
            content_length: None,
            transfer_encoding_chunked: false,
        }
    }

    pub fn is_buffer_empty(&self) -> bool {
        self.buf_len == 0
    }

    fn find_delimiter(&self, pattern: &[u8]) -> Option<usize> {
        self.buf[..self.buf_len]
            .windows(pattern.len())
            .position(|window| window == pattern)
    }

    fn parse_request_line(&mut self, req: &mut Request) -> Result<ParserOk, ParserError> {
        let end = self.find_delimiter(b"\r\n");

        let request_line_end = match end {
            Some(idx) => idx,
            None => {
                if self.buf_len > config().max_request_line_size {
                    return Err(ParserError::TooLongUri);
                }
                return Ok(ParserOk::Incomplete);
            }
        };

        // §8 boundary behavior: an overlong request line is reported as
        // 414 (URI Too Long), not a generic 400 — the request-target is
        // almost always what makes the line overlong in practice.
        if request_line_end > config().max_request_line_size {
            return Err(ParserError::TooLongUri);
        }

        let request_line = &self.buf[..request_line_end];
        let parts: Vec<&[u8]> = request_line.split(|&b| b == b' ').collect();
        if parts.len() != 3 {
            return Err(ParserError::Error);
        }

        let method = std::str::from_utf8(parts[0]).map_err(|_| ParserError::Error)?;
        let method_enum = match http_method_from_str(method) {
            HttpMethod::Unknown => return Err(ParserError::Error),
            m => m,
        };

        let uri = std::str::from_utf8(parts[1]).map_err(|_| ParserError::Error)?;
        if uri.len() > config().max_uri_size {
            return Err(ParserError::TooLongUri);
        }

        let version = std::str::from_utf8(parts[2]).map_err(|_| ParserError::Error)?;
        let http_version = version
            .strip_prefix("HTTP/")
            .and_then(|v| v.split_once('.'))
            .ok_or(ParserError::Error)?;

        let (maj, min) = http_version;
        let maj: u8 = maj.parse().map_err(|_| ParserError::Error)?;
        let min: u8 = min.parse().map_err(|_| ParserError::Error)?;
        let version = HttpVersion::is_valid((maj, min)).map_err(|_| ParserError::Error)?;

        req.method = method_enum;
        req.uri = uri.to_string();
        req.version = version;
        req.url = Url::parse(uri);

        let consume = request_line_end + 2;
        let remaining = self.buf_len - consume;
        self.state = ParserState::Headers;
        self.buf.copy_within(consume..self.buf_len, 0);
        self.buf_len = remaining;

        Ok(ParserOk::Ok)
    }

    fn get_header_name(name: &[u8]) -> Result<&str, ParserError> {
        let s = std::str::from_utf8(name).map_err(|_| ParserError::Error)?;
        if s.is_empty() {
            return Err(ParserError::Error);
        }
        if !s
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b))
        {
            return Err(ParserError::Error);
        }
        Ok(s)
    }

    fn get_header_value(value: &[u8]) -> Result<&str, ParserError> {
        let s = std::str::from_utf8(value).map_err(|_| ParserError::Error)?;
        if s.bytes().any(|b| (b < 0x20 && b != 0x09) || b == 0x7F) {
            return Err(ParserError::Error);
        }
        Ok(s.trim())
    }

    fn record_header(&mut self, req: &mut Request, name: &str, value: &str) -> Result<(), ParserError> {
        let lower = name.to_ascii_lowercase();
        match lower.as_str() {
            "content-length" => {
                let n: u64 = value.parse().map_err(|_| ParserError::Error)?;
                match self.content_length {
                    Some(existing) if existing != n => return Err(ParserError::ConflictingFraming),
                    _ => self.content_length = Some(n),
                }
            }
            "transfer-encoding" => {
                if value.split(',').any(|v| v.trim().eq_ignore_ascii_case("chunked")) {
                    self.transfer_encoding_chunked = true;
                }
            }
            _ => {}
        }
        req.headers.add_comma_split(name, value);
        self.last_header = Some(lower);
        Ok(())
    }

    fn parse_headers(&mut self, req: &mut Request) -> Result<ParserOk, ParserError> {
        let headers_end = self.find_delimiter(b"\r\n\r\n");
        let next_line_end = self.find_delimiter(b"\r\n");

        if next_line_end.is_none() {
            if self.buf_len == PARSER_BUF_CAP {
                return Err(ParserError::Error);
            }
            return Ok(ParserOk::Incomplete);
        }

        let bytes_to_consume = if let Some(end) = headers_end {
            end + 4
        } else {
            next_line_end.unwrap() + 2
        };

        self.headers_bytes_parsed += bytes_to_consume;
        if self.headers_bytes_parsed > config().max_header_size {
            return Err(ParserError::Error);
        }

        let headers_chunk = &self.buf[..bytes_to_consume];
        let mut is_header_end = false;
        for raw_line in headers_chunk.split(|&b| b == b'\n') {
            if raw_line.is_empty() {
                continue;
            }
            let line = raw_line.strip_suffix(b"\r").unwrap_or(raw_line);
            if line.is_empty() {
                is_header_end = true;
                break;
            }

            if (line[0] == b' ' || line[0] == b'\t') && self.last_header.is_some() {
                // obs-fold: continuation of the previous header's value.
                let cont = Self::get_header_value(line)?;
                req.headers.append_continuation(cont);
                continue;
            }

            let mut parts = line.splitn(2, |&b| b == b':');
            let name = parts.next().unwrap();
            let value = parts.next().ok_or(ParserError::Error)?;

            let name = Self::get_header_name(name)?;
            let value = Self::get_header_value(value)?;
            self.record_header(req, name, value)?;
        }

        let remaining = self.buf_len - bytes_to_consume;
        self.buf.copy_within(bytes_to_consume..self.buf_len, 0);
        self.buf_len = remaining;

        if headers_end.is_none() && !is_header_end {
            return Ok(ParserOk::Incomplete);
        }

        if self.content_length.is_some() && self.transfer_encoding_chunked {
            return Err(ParserError::ConflictingFraming);
        }

        self.state = ParserState::Done;
        Ok(ParserOk::Ok)
    }

    fn fill_buffer(&mut self, buf: &[u8]) -> Result<(), ParserError> {
        if self.buf_len + buf.len() > PARSER_BUF_CAP {
            return Err(ParserError::Error);
        }
        self.buf[self.buf_len..self.buf_len + buf.len()].copy_from_slice(buf);
        self.buf_len += buf.len();
        Ok(())
    }

    /// Decides the body-framing priority (§4.7): chunked, then
    /// content-length, then none. `Transfer-Encoding: chunked` and
    /// `Content-Length` take precedence over `method.forbids_body()` —
    /// a `GET`/`HEAD`/`TRACE` sending a framed body still has a body to
    /// drain, even though [`Validator`](crate::http::validator::Validator)
    /// separately rejects it as malformed. Only meaningful once headers
    /// are done.
    pub fn framing(&self, method: HttpMethod) -> Framing {
        if self.transfer_encoding_chunked {
            return Framing::Chunked;
        }
        if let Some(n) = self.content_length {
            return Framing::Length(n);
        }
        if method.forbids_body() {
            return Framing::None;
        }
        Framing::None
    }

    /// Bytes already pulled off the wire past the header block — the start
    /// of the body, to be handed to a `BodyReader` verbatim.
    pub fn take_leftover(&mut self) -> Vec<u8> {
        let leftover = self.buf[..self.buf_len].to_vec();
        self.buf_len = 0;
        leftover
    }

    /// Incremental parsing of the request line and headers.
    pub fn feed(&mut self, buf: &[u8], req: &mut Request) -> Result<ParserOk, ParserError> {
        self.fill_buffer(buf)?;

        loop {
            let outcome = match self.state {
                ParserState::RequestLine => self.parse_request_line(req)?,
                ParserState::Headers => match self.parse_headers(req)? {
                    ParserOk::Ok => ParserOk::HeadersDone,
                    other => other,
                },
                ParserState::Done => return Ok(ParserOk::Done),
            };

            if outcome == ParserOk::Incomplete || outcome == ParserOk::HeadersDone {
                return Ok(outcome);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::*;
    use std::sync::Once;

    static INIT: Once = Once::new();

    fn setup() {
        INIT.call_once(|| {
            let cfg = ServerConfig {
                max_uri_size: 1024,
                max_header_size: 8192,
                max_body_size: 1024 * 1024,
                ..Default::default()
            };
            set_config(cfg);
        });
    }

    fn run_test<F: FnOnce(&mut Parser, &mut Request)>(f: F) {
        setup();
        let mut parser = Parser::new();
        let mut req = Request::empty();
        f(&mut parser, &mut req);
    }

    fn parse_iteratively<F>(
        parser: &mut Parser,
        req: &mut Request,
        data: &[u8],
        parsing_method: F,
    ) -> Result<ParserOk, ParserError>
    where
        F: Fn(&mut Parser, &mut Request) -> Result<ParserOk, ParserError>,
    {
        let mut offset = 0;
        loop {
            if offset >= data.len() {
                break;
            }
            let chunk_size = std::cmp::min(4, data.len() - offset);
            let chunk = &data[offset..offset + chunk_size];
            offset += chunk_size;

            parser.fill_buffer(chunk).unwrap();
            let result = parsing_method(parser, req)?;
            if result != ParserOk::Incomplete {
                return Ok(result);
            }
        }
        Ok(ParserOk::Incomplete)
    }

    mod request_line {
        use super::*;

        #[test]
        fn valid_line() {
            run_test(|parser, req| {
                let line = b"GET /index.html HTTP/1.1\r\n";
                parser.fill_buffer(line).unwrap();
                let r = parser.parse_request_line(req).unwrap();
                assert_eq!(r, ParserOk::Ok);
                assert_eq!(req.method, HttpMethod::Get);
                assert_eq!(req.uri, "/index.html");
                assert_eq!(req.version, HttpVersion::V1_1);
            });
        }

        #[test]
        fn bad_method() {
            run_test(|parser, req| {
                let line = b"BADMETHOD /index.html HTTP/1.1\r\n";
                parser.fill_buffer(line).unwrap();
                assert_eq!(parser.parse_request_line(req), Err(ParserError::Error));
            });
        }

        #[test]
        fn too_long_uri() {
            run_test(|parser, req| {
                let long_uri = "a".repeat(config().max_uri_size + 1);
                let line = format!("GET /{} HTTP/1.1\r\n", long_uri);
                let r =
                    parse_iteratively(parser, req, line.as_bytes(), |p, r| p.parse_request_line(r));
                assert_eq!(r, Err(ParserError::TooLongUri));
            });
        }

        #[test]
        fn bad_http_version() {
            run_test(|parser, req| {
                let line = b"GET /index.html HTTP/XYZ\r\n";
                parser.fill_buffer(line).unwrap();
                assert_eq!(parser.parse_request_line(req), Err(ParserError::Error));
            });
        }

        #[test]
        fn request_line_over_limit_is_414() {
            run_test(|parser, req| {
                let filler = "a".repeat(config().max_request_line_size + 1);
                let line = format!("GET /{} HTTP/1.1\r\n", filler);
                let r =
                    parse_iteratively(parser, req, line.as_bytes(), |p, r| p.parse_request_line(r));
                assert_eq!(r, Err(ParserError::TooLongUri));
            });
        }

        #[test]
        fn incomplete_line() {
            run_test(|parser, req| {
                let line = b"GET /incomplete";
                parser.fill_buffer(line).unwrap();
                assert_eq!(parser.parse_request_line(req).unwrap(), ParserOk::Incomplete);
            });
        }
    }

    mod headers {
        use super::*;

        #[test]
        fn valid_headers() {
            run_test(|parser, req| {
                let headers = b"Host: example.com\r\nContent-Length: 5\r\n\r\n";
                parser.fill_buffer(headers).unwrap();
                let r = parser.parse_headers(req).unwrap();
                assert_eq!(r, ParserOk::Ok);
                assert_eq!(req.headers.get("Host").unwrap(), "example.com");
                assert_eq!(parser.content_length, Some(5));
            });
        }

        #[test]
        fn obs_fold_continuation_is_joined_with_space() {
            run_test(|parser, req| {
                let headers = b"X-Thing: first\r\n second\r\n\r\n";
                parser.fill_buffer(headers).unwrap();
                parser.parse_headers(req).unwrap();
                assert_eq!(req.headers.get("X-Thing"), Some("first second"));
            });
        }

        #[test]
        fn conflicting_content_length_and_chunked_is_rejected() {
            run_test(|parser, req| {
                let headers = b"Content-Length: 10\r\nTransfer-Encoding: chunked\r\n\r\n";
                parser.fill_buffer(headers).unwrap();
                assert_eq!(
                    parser.parse_headers(req),
                    Err(ParserError::ConflictingFraming)
                );
            });
        }

        #[test]
        fn repeated_conflicting_content_length_is_rejected() {
            run_test(|parser, req| {
                let headers = b"Content-Length: 10\r\nContent-Length: 20\r\n\r\n";
                parser.fill_buffer(headers).unwrap();
                assert_eq!(parser.parse_headers(req), Err(ParserError::Error));
            });
        }

        #[test]
        fn malformed_header() {
            run_test(|parser, req| {
                let header = b"BadHeaderWithoutColon\r\n\r\n";
                parser.fill_buffer(header).unwrap();
                assert_eq!(parser.parse_headers(req), Err(ParserError::Error));
            });
        }

        #[test]
        fn header_too_long() {
            run_test(|parser, req| {
                let long_header = format!(
                    "X-Header: {}\r\n\r\n",
                    "a".repeat(config().max_header_size + 1)
                );
                let r = parse_iteratively(parser, req, long_header.as_bytes(), |p, r| {
                    p.parse_headers(r)
                });
                assert_eq!(r, Err(ParserError::Error));
            });
        }
    }

    #[test]
    fn framing_chunked_takes_priority_over_length() {
        run_test(|parser, req| {
            let all = b"GET /x HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n";
            parser.feed(all, req).unwrap();
            assert_eq!(parser.framing(req.method), Framing::Chunked);
        });
    }

    #[test]
    fn framing_none_for_body_forbidding_method() {
        run_test(|parser, req| {
            let all = b"GET /x HTTP/1.1\r\nContent-Length: 5\r\n\r\n";
            parser.feed(all, req).unwrap();
            assert_eq!(parser.framing(req.method), Framing::None);
        });
    }

    #[test]
    fn leftover_bytes_after_headers_done_are_preserved() {
        run_test(|parser, req| {
            let all = b"POST /x HTTP/1.1\r\nContent-Length: 3\r\n\r\nabc";
            parser.feed(all, req).unwrap();
            assert_eq!(parser.take_leftover(), b"abc");
        });
    }
}
