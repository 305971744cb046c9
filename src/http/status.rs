//! Standard HTTP status codes and their reason phrases.
//!
//! The reason-phrase table is process-wide and immutable after first use
//! (Design Notes §9: "initialize lazily with a one-shot guard").

use once_cell::sync::Lazy;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpStatus {
    Ok = 200,
    Created = 201,
    NoContent = 204,

    MovedPermanently = 301,
    Found = 302,
    NotModified = 304,

    BadRequest = 400,
    Forbidden = 403,
    NotFound = 404,
    MethodNotAllowed = 405,
    LengthRequired = 411,
    PayloadTooLarge = 413,
    UriTooLong = 414,

    InternalServerError = 500,
    NotImplemented = 501,
    HttpVersionNotSupported = 505,
}

impl HttpStatus {
    pub fn code(&self) -> u16 {
        *self as u16
    }

    pub fn reason_phrase(&self) -> &'static str {
        STANDARD_STATUS_CODES
            .get(&self.code())
            .copied()
            .unwrap_or("")
    }
}

static STANDARD_STATUS_CODES: Lazy<HashMap<u16, &'static str>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert(200, "OK");
    m.insert(201, "Created");
    m.insert(204, "No Content");
    m.insert(301, "Moved Permanently");
    m.insert(302, "Found");
    m.insert(304, "Not Modified");
    m.insert(400, "Bad Request");
    m.insert(403, "Forbidden");
    m.insert(404, "Not Found");
    m.insert(405, "Method Not Allowed");
    m.insert(411, "Length Required");
    m.insert(413, "Payload Too Large");
    m.insert(414, "URI Too Long");
    m.insert(500, "Internal Server Error");
    m.insert(501, "Not Implemented");
    m.insert(505, "HTTP Version Not Supported");
    m
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_phrases_resolve() {
        assert_eq!(HttpStatus::Ok.reason_phrase(), "OK");
        assert_eq!(HttpStatus::NotFound.reason_phrase(), "Not Found");
        assert_eq!(HttpStatus::UriTooLong.reason_phrase(), "URI Too Long");
    }
}
