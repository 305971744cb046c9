pub mod headers;
pub mod parser;
pub mod request;
pub mod response;
pub mod status;
pub mod stream_codec;
pub mod url;
pub mod validator;

const HTTP_METHOD_MAX_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Options,
    Get,
    Head,
    Post,
    Put,
    Delete,
    Trace,
    Connect,
    Patch,
    Unknown,
}

impl HttpMethod {
    /// Methods for which a request body is never valid (§4.7 body-framing priority,
    /// last rule: "no body for methods that forbid one").
    pub fn forbids_body(&self) -> bool {
        matches!(self, HttpMethod::Get | HttpMethod::Head | HttpMethod::Trace)
    }
}

pub fn http_method_from_str(method: &str) -> HttpMethod {
    if method.len() > HTTP_METHOD_MAX_LEN {
        return HttpMethod::Unknown;
    }
    match method {
        "OPTIONS" => HttpMethod::Options,
        "GET" => HttpMethod::Get,
        "HEAD" => HttpMethod::Head,
        "POST" => HttpMethod::Post,
        "PUT" => HttpMethod::Put,
        "DELETE" => HttpMethod::Delete,
        "TRACE" => HttpMethod::Trace,
        "CONNECT" => HttpMethod::Connect,
        "PATCH" => HttpMethod::Patch,
        _ => HttpMethod::Unknown,
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Trace => "TRACE",
            HttpMethod::Connect => "CONNECT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// Either a specific HTTP method or the wildcard that matches any method.
/// Mirrors the original's `MethodChoice = std::variant<Method, All>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodChoice {
    Specific(HttpMethod),
    All,
}

impl MethodChoice {
    pub fn matches(&self, method: HttpMethod) -> bool {
        match self {
            MethodChoice::All => true,
            MethodChoice::Specific(m) => *m == method,
        }
    }
}

/// Only HTTP/1.0 and HTTP/1.1 are implemented; the version enum keeps slots
/// for 2/3 so the wire representation round-trips even though the frame
/// layers for them are out of scope (§1 Non-goals).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Deserialize)]
pub enum HttpVersion {
    #[serde(rename = "1.0")]
    V1_0,
    #[serde(rename = "1.1")]
    V1_1,
    V2,
    V3,
}

impl HttpVersion {
    pub fn is_valid(v: (u8, u8)) -> Result<HttpVersion, ()> {
        match v {
            (1, 0) => Ok(HttpVersion::V1_0),
            (1, 1) => Ok(HttpVersion::V1_1),
            (2, 0) => Ok(HttpVersion::V2),
            (3, 0) => Ok(HttpVersion::V3),
            _ => Err(()),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpVersion::V1_0 => "HTTP/1.0",
            HttpVersion::V1_1 => "HTTP/1.1",
            HttpVersion::V2 => "HTTP/2",
            HttpVersion::V3 => "HTTP/3",
        }
    }
}
