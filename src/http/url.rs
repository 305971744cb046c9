//! Decomposes a request-target into protocol, host, port, path, query, and
//! fragment (§4.8). Each field is a borrowed view into the single backing
//! buffer to avoid per-field allocation, matching the original's
//! `std::string_view` fields over one `hrefValue` string
//! (`original_source/NisseHTTP/URL.h`).
//!
//! Query parameters are decoded lazily on first access and cached.

use once_cell::sync::OnceCell;
use percent_encoding::percent_decode_str;
use std::collections::HashMap;

pub struct Url {
    href: String,
    protocol_end: usize,
    path_start: usize,
    query_start: Option<usize>,
    hash_start: Option<usize>,
    host_start: usize,
    host_end: usize,
    port_start: Option<usize>,

    query_params: OnceCell<HashMap<String, String>>,
    invalid: bool,
}

impl Url {
    /// Parses an absolute or origin-form request-target (`/path?q#h` or
    /// `proto://host:port/path?q#h`).
    pub fn parse(raw: &str) -> Self {
        let href = raw.to_string();
        let mut invalid = false;

        let (protocol_end, authority_start) = match href.find("://") {
            Some(idx) => (idx + 1, idx + 3),
            None => (0, 0),
        };

        let (host_start, host_end, port_start, path_start) = if authority_start > 0 {
            let rest = &href[authority_start..];
            let path_rel = rest.find('/').unwrap_or(rest.len());
            let authority = &rest[..path_rel];
            let host_end_rel = authority.find(':').unwrap_or(authority.len());
            let port_start = if host_end_rel < authority.len() {
                Some(authority_start + host_end_rel + 1)
            } else {
                None
            };
            (
                authority_start,
                authority_start + host_end_rel,
                port_start,
                authority_start + path_rel,
            )
        } else {
            (0, 0, None, 0)
        };

        let hash_start = href.find('#');
        let query_end = hash_start.unwrap_or(href.len());
        let query_start = href[path_start..query_end].find('?').map(|i| path_start + i);

        if raw.is_empty() {
            invalid = true;
        }

        Url {
            href,
            protocol_end,
            path_start,
            query_start,
            hash_start,
            host_start,
            host_end,
            port_start,
            query_params: OnceCell::new(),
            invalid,
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.invalid
    }

    pub fn href(&self) -> &str {
        &self.href
    }

    pub fn protocol(&self) -> &str {
        if self.protocol_end == 0 {
            ""
        } else {
            &self.href[..self.protocol_end]
        }
    }

    pub fn origin(&self) -> &str {
        if self.path_start == 0 || self.protocol_end == 0 {
            ""
        } else {
            &self.href[..self.path_start]
        }
    }

    pub fn host(&self) -> &str {
        if self.protocol_end == 0 {
            ""
        } else {
            &self.href[self.host_start..self.path_start]
        }
    }

    pub fn hostname(&self) -> &str {
        &self.href[self.host_start..self.host_end]
    }

    pub fn port(&self) -> &str {
        match self.port_start {
            Some(start) => &self.href[start..self.path_start],
            None => "",
        }
    }

    pub fn pathname(&self) -> &str {
        let end = self
            .query_start
            .or(self.hash_start)
            .unwrap_or(self.href.len());
        let path = &self.href[self.path_start..end];
        if path.is_empty() { "/" } else { path }
    }

    /// Full query component including the leading `?`, or empty string.
    pub fn query(&self) -> &str {
        match self.query_start {
            Some(start) => {
                let end = self.hash_start.unwrap_or(self.href.len());
                &self.href[start..end]
            }
            None => "",
        }
    }

    /// Full fragment component including the leading `#`, or empty string.
    pub fn hash(&self) -> &str {
        match self.hash_start {
            Some(start) => &self.href[start..],
            None => "",
        }
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.query_map().get(name).map(String::as_str)
    }

    pub fn query_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.query_map().iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn query_map(&self) -> &HashMap<String, String> {
        self.query_params.get_or_init(|| decode_query(self.query()))
    }
}

pub(crate) fn decode_query(query: &str) -> HashMap<String, String> {
    let body = query.strip_prefix('?').unwrap_or(query);
    let mut map = HashMap::new();
    if body.is_empty() {
        return map;
    }
    for pair in body.split('&') {
        if pair.is_empty() {
            continue;
        }
        let (k, v) = match pair.split_once('=') {
            Some((k, v)) => (k, v),
            None => (pair, ""),
        };
        let k = decode_query_component(k);
        let v = decode_query_component(v);
        map.insert(k, v);
    }
    map
}

/// Query-string decoding treats `+` as space, unlike path-segment decoding
/// (§4.9: "`+` in path segments is *not* decoded to space").
fn decode_query_component(s: &str) -> String {
    let replaced = s.replace('+', " ");
    percent_decode_str(&replaced).decode_utf8_lossy().into_owned()
}

/// Strict `%XX` percent-decoding for a path segment. `+` is left untouched.
/// Returns `None` if an escape is malformed (§4.8: "invalid escapes mark
/// the URL invalid").
pub fn decode_path_segment(segment: &str) -> Option<String> {
    let bytes = segment.as_bytes();
    let mut raw = Vec::with_capacity(segment.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if i + 3 > bytes.len() {
                return None;
            }
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok()?;
            let value = u8::from_str_radix(hex, 16).ok()?;
            raw.push(value);
            i += 3;
        } else {
            raw.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(raw).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_relative_path_with_query_and_hash() {
        let u = Url::parse("/status?name=ryan#234");
        assert_eq!(u.pathname(), "/status");
        assert_eq!(u.query(), "?name=ryan");
        assert_eq!(u.hash(), "#234");
        assert_eq!(u.param("name"), Some("ryan"));
    }

    #[test]
    fn parses_absolute_url() {
        let u = Url::parse("http://localhost:53/status?name=ryan");
        assert_eq!(u.protocol(), "http:");
        assert_eq!(u.hostname(), "localhost");
        assert_eq!(u.port(), "53");
        assert_eq!(u.pathname(), "/status");
    }

    #[test]
    fn root_path_when_empty() {
        let u = Url::parse("http://localhost");
        assert_eq!(u.pathname(), "/");
    }

    #[test]
    fn query_plus_decodes_to_space() {
        let u = Url::parse("/search?q=a+b");
        assert_eq!(u.param("q"), Some("a b"));
    }

    #[test]
    fn path_segment_decode_rejects_bad_escape() {
        assert_eq!(decode_path_segment("abc"), Some("abc".to_string()));
        assert_eq!(decode_path_segment("a%2Fb"), Some("a/b".to_string()));
        assert_eq!(decode_path_segment("a%2"), None);
        assert_eq!(decode_path_segment("a%zz"), None);
    }

    #[test]
    fn path_segment_plus_not_decoded() {
        assert_eq!(decode_path_segment("a+b"), Some("a+b".to_string()));
    }
}
