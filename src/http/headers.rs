//! HTTP headers abstraction shared by [`Request`](crate::http::request::Request) and
//! [`Response`](crate::http::response::Response).
//!
//! Headers are stored in an ordered map to preserve insertion order, keyed
//! case-insensitively. Each name maps to an ordered list of values: a
//! single `name: v1, v2` line on the wire is split into two list entries on
//! parse, and a name set more than once via [`HeaderMap::add`] appends
//! rather than overwrites. Semantically single-valued headers (e.g.
//! `Content-Length`) go through [`HeaderMap::set`], which replaces the
//! whole entry.
//!
//! This abstraction enforces no HTTP semantics of its own; higher-level
//! code (the parser, the validator) decides which headers must be unique
//! and what a duplicate means.

use indexmap::IndexMap;

struct HeaderEntry {
    display_name: String,
    values: Vec<String>,
}

#[derive(Default)]
pub struct HeaderMap {
    entries: IndexMap<String, HeaderEntry>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }

    /// Appends a value under `name`, preserving any values already present.
    pub fn add(&mut self, name: &str, value: &str) {
        let key = name.to_ascii_lowercase();
        self.entries
            .entry(key)
            .or_insert_with(|| HeaderEntry {
                display_name: name.to_string(),
                values: Vec::new(),
            })
            .values
            .push(value.to_string());
    }

    /// Appends `value` after splitting it on top-level commas, per the
    /// wire rule that a comma-separated single-line value becomes multiple
    /// list entries.
    pub fn add_comma_split(&mut self, name: &str, value: &str) {
        for part in value.split(',') {
            let part = part.trim();
            if !part.is_empty() {
                self.add(name, part);
            }
        }
    }

    /// Replaces any existing values under `name` with the single `value`.
    /// Used for headers that are semantically single-valued.
    pub fn set(&mut self, name: &str, value: &str) {
        let key = name.to_ascii_lowercase();
        self.entries.insert(
            key,
            HeaderEntry {
                display_name: name.to_string(),
                values: vec![value.to_string()],
            },
        );
    }

    pub fn remove(&mut self, name: &str) {
        self.entries.shift_remove(&name.to_ascii_lowercase());
    }

    /// Appends `cont` to the last value of the most recently added header,
    /// joined by a single space — obs-fold continuation line handling
    /// (§4.7: "concatenation with a single space").
    pub fn append_continuation(&mut self, cont: &str) {
        if let Some(entry) = self.entries.values_mut().last() {
            if let Some(last) = entry.values.last_mut() {
                last.push(' ');
                last.push_str(cont);
            }
        }
    }

    /// First value under `name`, if any.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .get(&name.to_ascii_lowercase())
            .and_then(|e| e.values.first())
            .map(String::as_str)
    }

    pub fn get_all(&self, name: &str) -> &[String] {
        self.entries
            .get(&name.to_ascii_lowercase())
            .map(|e| e.values.as_slice())
            .unwrap_or(&[])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_ascii_lowercase())
    }

    pub fn count_values(&self, name: &str) -> usize {
        self.get_all(name).len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .values()
            .map(|e| (e.display_name.as_str(), e.values.as_slice()))
    }

    /// Renders every header as one `Name: v1, v2\r\n` line per distinct
    /// name, in insertion order.
    pub fn stringify(&self) -> String {
        let mut result = String::new();
        for entry in self.entries.values() {
            result.push_str(&entry.display_name);
            result.push_str(": ");
            result.push_str(&entry.values.join(", "));
            result.push_str("\r\n");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_insensitive_lookup() {
        let mut h = HeaderMap::new();
        h.set("Content-Type", "text/plain");
        assert_eq!(h.get("content-type"), Some("text/plain"));
        assert_eq!(h.get("CONTENT-TYPE"), Some("text/plain"));
    }

    #[test]
    fn comma_split_round_trips() {
        let mut h = HeaderMap::new();
        h.add_comma_split("Accept", "text/html, application/json");
        assert_eq!(h.get_all("accept"), &["text/html", "application/json"]);
        let rendered = h.stringify();
        assert_eq!(rendered, "Accept: text/html, application/json\r\n");
    }

    #[test]
    fn set_replaces_prior_values() {
        let mut h = HeaderMap::new();
        h.add("X-Thing", "a");
        h.add("X-Thing", "b");
        h.set("X-Thing", "c");
        assert_eq!(h.get_all("x-thing"), &["c"]);
    }

    #[test]
    fn preserves_insertion_order() {
        let mut h = HeaderMap::new();
        h.set("Zebra", "1");
        h.set("Apple", "2");
        let names: Vec<&str> = h.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["Zebra", "Apple"]);
    }
}
