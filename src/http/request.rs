//! The request object handed to a route's validator and action.
//!
//! Immutable from the handler's point of view except for `variables`
//! (§3 Data model). The body is attached by the dispatcher once framing
//! has been decided, after the parser has produced the head section.

use crate::http::HttpMethod;
use crate::http::HttpVersion;
use crate::http::headers::HeaderMap;
use crate::http::stream_codec::BodyReader;
use crate::http::url::Url;
use crate::net::context::Context;
use indexmap::IndexMap;
use std::sync::Arc;

/// Free-form key → value map populated by the dispatcher from query
/// parameters, path captures, and form fields, in that precedence order
/// (§6 "Variable map keys").
#[derive(Default)]
pub struct RequestVariables {
    store: IndexMap<String, String>,
}

impl RequestVariables {
    pub fn new() -> Self {
        Self {
            store: IndexMap::new(),
        }
    }

    pub fn insert_or_assign(&mut self, key: String, value: String) {
        self.store.insert(key, value);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.store.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.store.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.store.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

pub struct Request {
    pub method: HttpMethod,
    pub version: HttpVersion,
    pub uri: String,
    pub url: Url,
    pub headers: HeaderMap,
    pub variables: RequestVariables,
    body: Option<BodyReader>,
    context: Option<Arc<Context>>,
}

impl Request {
    /// An empty request shell, filled in by the parser as it progresses
    /// through the request line and headers.
    pub fn empty() -> Self {
        Self {
            method: HttpMethod::Unknown,
            version: HttpVersion::V1_1,
            uri: String::new(),
            url: Url::parse(""),
            headers: HeaderMap::new(),
            variables: RequestVariables::new(),
            body: None,
            context: None,
        }
    }

    /// Attaches the body stream once the dispatcher has decided framing.
    pub fn attach_body(&mut self, body: BodyReader) {
        self.body = Some(body);
    }

    /// Attaches the per-task [`Context`], the request's back-pointer for
    /// registering ancillary descriptors (§3 Data model).
    pub fn attach_context(&mut self, context: Arc<Context>) {
        self.context = Some(context);
    }

    pub fn context(&self) -> &Context {
        self.context
            .as_deref()
            .expect("request context read before it was attached")
    }

    pub fn body(&mut self) -> &mut BodyReader {
        self.body
            .as_mut()
            .expect("request body read before it was attached")
    }

    /// Trailing headers, populated only once the chunked body has reached
    /// end-of-stream (§3 Data model, §4.6).
    pub fn trailers(&self) -> &HeaderMap {
        self.body
            .as_ref()
            .expect("request body not attached")
            .trailers()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variables_later_insert_overwrites_earlier() {
        let mut vars = RequestVariables::new();
        vars.insert_or_assign("id".to_string(), "from-query".to_string());
        vars.insert_or_assign("id".to_string(), "from-path".to_string());
        assert_eq!(vars.get("id"), Some("from-path"));
    }

    #[test]
    fn variables_missing_key_is_none() {
        let vars = RequestVariables::new();
        assert_eq!(vars.get("missing"), None);
    }
}
