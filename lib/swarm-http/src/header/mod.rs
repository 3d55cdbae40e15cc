/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::io::Write;

use arcstr::ArcStr;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use crate::date::{self, HttpDateOrRaw};

mod name_cache;
pub use name_cache::HeaderNameCache;

mod request;
pub use request::RequestHeader;

mod response;
pub use response::ResponseHeader;

/// Property holding the peer address of the connection a request arrived on.
pub const CLIENT_ADDR_PROPERTY: &str = "client-addr";

const SET_COOKIE: &str = "set-cookie";

#[derive(Clone, Debug)]
struct HeaderEntry {
    name: ArcStr,
    value: String,
}

/// An ordered multi-valued header collection with case-insensitive names.
///
/// Every occurrence is keyed by the lower-cased name and its occurrence
/// index, so no wire name can alias another name's n-th value. Message
/// properties live in their own map and are never serialized.
#[derive(Clone, Debug, Default)]
pub struct Header {
    entries: IndexMap<(String, usize), HeaderEntry>,
    counts: IndexMap<String, usize>,
    properties: IndexMap<String, String>,
    cookies: Vec<String>,
    name_cache: Option<HeaderNameCache>,
}

impl Header {
    pub fn new() -> Self {
        Header::default()
    }

    pub fn with_name_cache(name_cache: HeaderNameCache) -> Self {
        Header {
            name_cache: Some(name_cache),
            ..Default::default()
        }
    }

    fn first_entry_mut(&mut self, lower: String) -> Option<&mut HeaderEntry> {
        self.entries.get_mut(&(lower, 0))
    }

    fn canonical_name(&self, lower: &str, name: &str) -> ArcStr {
        if let Some(entry) = self.entries.get(&(lower.to_string(), 0)) {
            return entry.name.clone();
        }
        match &self.name_cache {
            Some(cache) => cache.canonical(lower, name),
            None => ArcStr::from(name),
        }
    }

    /// Overwrite the value of the first occurrence, or insert it if absent.
    pub fn put(&mut self, name: &str, value: impl Into<String>) {
        let lower = name.to_ascii_lowercase();
        if let Some(entry) = self.first_entry_mut(lower) {
            entry.value = value.into();
        } else {
            self.add(name, value);
        }
    }

    /// Append a new occurrence.
    pub fn add(&mut self, name: &str, value: impl Into<String>) {
        let lower = name.to_ascii_lowercase();
        let name = self.canonical_name(&lower, name);
        let count = self.counts.entry(lower.clone()).or_insert(0);
        let index = *count;
        *count += 1;
        self.entries.insert(
            (lower, index),
            HeaderEntry {
                name,
                value: value.into(),
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        let lower = name.to_ascii_lowercase();
        self.entries.get(&(lower, 0)).map(|e| e.value.as_str())
    }

    pub fn get_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.get(name).unwrap_or(default)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.key_count(name) > 0
    }

    pub fn key_count(&self, name: &str) -> usize {
        let lower = name.to_ascii_lowercase();
        self.counts.get(&lower).copied().unwrap_or(0)
    }

    /// All values of `name` in arrival order.
    pub fn get_multiple(&self, name: &str) -> Vec<&str> {
        let lower = name.to_ascii_lowercase();
        let count = self.counts.get(&lower).copied().unwrap_or(0);
        let mut key = (lower, 0);
        let mut values = Vec::with_capacity(count);
        for i in 0..count {
            key.1 = i;
            if let Some(e) = self.entries.get(&key) {
                values.push(e.value.as_str());
            }
        }
        values
    }

    /// Remove all occurrences of `name`.
    pub fn remove(&mut self, name: &str) -> bool {
        let lower = name.to_ascii_lowercase();
        let Some(count) = self.counts.shift_remove(&lower) else {
            return false;
        };
        let mut key = (lower, 0);
        for i in 0..count {
            key.1 = i;
            self.entries.shift_remove(&key);
        }
        true
    }

    /// Append text to the latest value of `name`, used for continuation lines.
    pub(crate) fn extend_last_value(&mut self, name: &str, more: &str) -> bool {
        let lower = name.to_ascii_lowercase();
        let Some(count) = self.counts.get(&lower).copied() else {
            return false;
        };
        let Some(entry) = self.entries.get_mut(&(lower, count - 1)) else {
            return false;
        };
        if !more.is_empty() {
            entry.value.push(' ');
            entry.value.push_str(more);
        }
        true
    }

    /// Iterate all name and value pairs in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .values()
            .map(|e| (e.name.as_str(), e.value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Attach a message property, it is never sent on the wire.
    pub fn set_property(&mut self, name: &str, value: impl Into<String>) {
        self.properties
            .insert(name.to_ascii_lowercase(), value.into());
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties
            .get(&name.to_ascii_lowercase())
            .map(|v| v.as_str())
    }

    /// Add a value to the Set-Cookie side list.
    pub fn set_cookie(&mut self, value: impl Into<String>) {
        self.cookies.push(value.into());
    }

    pub fn cookies(&self) -> &[String] {
        &self.cookies
    }

    pub(crate) fn extend_last_cookie(&mut self, more: &str) -> bool {
        let Some(cookie) = self.cookies.last_mut() else {
            return false;
        };
        if !more.is_empty() {
            cookie.push(' ');
            cookie.push_str(more);
        }
        true
    }

    /// Serialize the status line, all headers and the final blank line.
    ///
    /// No status line will be written if `status_line` is empty.
    pub fn serialize(&self, status_line: &str) -> Vec<u8> {
        let mut buf = Vec::<u8>::with_capacity(256);
        self.serialize_to(status_line, &mut buf);
        buf
    }

    pub fn serialize_to(&self, status_line: &str, buf: &mut Vec<u8>) {
        if !status_line.is_empty() {
            buf.extend_from_slice(status_line.as_bytes());
            buf.extend_from_slice(b"\r\n");
        }
        for (name, value) in self.iter() {
            let _ = write!(buf, "{name}: {value}\r\n");
        }
        for cookie in &self.cookies {
            let _ = write!(buf, "Set-Cookie: {cookie}\r\n");
        }
        buf.extend_from_slice(b"\r\n");
    }

    /// Feed a parsed header line, Set-Cookie values go to the side list.
    pub(crate) fn add_parsed(&mut self, name: &str, value: &str) {
        if name.eq_ignore_ascii_case(SET_COOKIE) {
            self.set_cookie(value);
        } else {
            self.add(name, value);
        }
    }

    /// The Content-Length value, -1 if absent or malformed.
    pub fn content_length(&self) -> i64 {
        self.get(http::header::CONTENT_LENGTH.as_str())
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|v| *v >= 0)
            .unwrap_or(-1)
    }

    pub fn set_content_length(&mut self, len: u64) {
        let mut buffer = itoa::Buffer::new();
        self.put("Content-Length", buffer.format(len));
    }

    /// The lower-cased essence of the Content-Type value.
    pub fn mime_type(&self) -> Option<String> {
        let v = self.get(http::header::CONTENT_TYPE.as_str())?;
        match v.parse::<mime::Mime>() {
            Ok(m) => Some(m.essence_str().to_ascii_lowercase()),
            Err(_) => {
                let essence = v.split(';').next().unwrap_or_default().trim();
                if essence.is_empty() {
                    None
                } else {
                    Some(essence.to_ascii_lowercase())
                }
            }
        }
    }

    pub fn charset(&self) -> Option<String> {
        let v = self.get(http::header::CONTENT_TYPE.as_str())?;
        if let Ok(m) = v.parse::<mime::Mime>() {
            return m
                .get_param(mime::CHARSET)
                .map(|c| c.as_str().to_ascii_lowercase());
        }
        v.split(';').skip(1).find_map(|p| {
            let (k, v) = p.split_once('=')?;
            if k.trim().eq_ignore_ascii_case("charset") {
                Some(v.trim().trim_matches('"').to_ascii_lowercase())
            } else {
                None
            }
        })
    }

    pub fn is_gzip(&self) -> bool {
        self.get(http::header::CONTENT_ENCODING.as_str())
            .map(|v| {
                let v = v.trim_start();
                v.len() >= 4 && v.as_bytes()[..4].eq_ignore_ascii_case(b"gzip")
            })
            .unwrap_or(false)
    }

    pub fn date_value(&self, name: &str) -> Option<DateTime<Utc>> {
        self.get(name).and_then(date::parse_http_date)
    }

    pub fn date_or_raw(&self, name: &str) -> Option<HttpDateOrRaw> {
        self.get(name).map(HttpDateOrRaw::parse)
    }

    pub fn put_date(&mut self, name: &str, dt: &DateTime<Utc>) {
        self.put(name, date::format_http_date(dt));
    }

    /// Whether a Connection like header contains "close".
    pub fn connection_close(&self) -> bool {
        ["Connection", "Proxy-Connection"].iter().any(|name| {
            self.get_multiple(name)
                .iter()
                .any(|v| v.to_ascii_lowercase().contains("close"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_get_multiple() {
        let mut h = Header::new();
        h.add("Accept", "text/html");
        h.add("accept", "text/plain");
        assert_eq!(h.key_count("ACCEPT"), 2);
        assert_eq!(h.get_multiple("Accept"), vec!["text/html", "text/plain"]);
        assert_eq!(h.get("accept"), Some("text/html"));

        h.put("ACCEPT", "*/*");
        assert_eq!(h.get_multiple("accept"), vec!["*/*", "text/plain"]);
        assert_eq!(h.key_count("accept"), 2);
    }

    #[test]
    fn put_absent() {
        let mut h = Header::new();
        h.put("Host", "a.example");
        assert_eq!(h.get("host"), Some("a.example"));
        assert_eq!(h.key_count("Host"), 1);
        assert_eq!(h.get_or("Referer", "none"), "none");
    }

    #[test]
    fn first_seen_casing() {
        let mut h = Header::new();
        h.add("X-Peer-Hop", "a");
        h.add("x-peer-hop", "b");
        let out = String::from_utf8(h.serialize("")).unwrap();
        assert_eq!(out, "X-Peer-Hop: a\r\nX-Peer-Hop: b\r\n\r\n");
    }

    #[test]
    fn remove_all() {
        let mut h = Header::new();
        h.add("Via", "1.1 a");
        h.add("Host", "a.example");
        h.add("Via", "1.1 b");
        assert!(h.remove("via"));
        assert!(!h.remove("via"));
        assert_eq!(h.key_count("Via"), 0);
        assert_eq!(h.len(), 1);
        h.add("Via", "1.1 c");
        assert_eq!(h.get_multiple("via"), vec!["1.1 c"]);
    }

    #[test]
    fn serialize_skip_internal() {
        let mut h = Header::new();
        h.add("Content-Type", "text/html");
        h.set_property("client-ip", "192.0.2.1");
        h.add("Content-Length", "4");
        h.set_cookie("a=1");
        h.set_cookie("b=2");
        assert_eq!(h.property("CLIENT-IP"), Some("192.0.2.1"));

        let out = String::from_utf8(h.serialize("HTTP/1.1 200 OK")).unwrap();
        assert_eq!(
            out,
            "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: 4\r\n\
             Set-Cookie: a=1\r\nSet-Cookie: b=2\r\n\r\n"
        );
        assert_eq!(h.len(), 2);
    }

    #[test]
    fn content_length() {
        let mut h = Header::new();
        assert_eq!(h.content_length(), -1);
        h.put("Content-Length", "abc");
        assert_eq!(h.content_length(), -1);
        h.put("content-length", " 1024 ");
        assert_eq!(h.content_length(), 1024);
        h.set_content_length(7);
        assert_eq!(h.get("Content-Length"), Some("7"));
    }

    #[test]
    fn content_type() {
        let mut h = Header::new();
        assert!(h.mime_type().is_none());
        h.put("Content-Type", "Text/HTML; charset=UTF-8");
        assert_eq!(h.mime_type().as_deref(), Some("text/html"));
        assert_eq!(h.charset().as_deref(), Some("utf-8"));

        h.put("Content-Type", "application/octet-stream");
        assert!(h.charset().is_none());
    }

    #[test]
    fn gzip() {
        let mut h = Header::new();
        assert!(!h.is_gzip());
        h.put("Content-Encoding", "GZIP");
        assert!(h.is_gzip());
        h.put("Content-Encoding", "x-gzip");
        assert!(!h.is_gzip());
    }

    #[test]
    fn connection_close() {
        let mut h = Header::new();
        assert!(!h.connection_close());
        h.add("Connection", "keep-alive");
        assert!(!h.connection_close());
        h.add("Proxy-Connection", "Close");
        assert!(h.connection_close());
    }

    #[test]
    fn name_cache() {
        let cache = HeaderNameCache::default();
        let mut h1 = Header::with_name_cache(cache.clone());
        h1.add("USER-AGENT", "a");
        let mut h2 = Header::with_name_cache(cache);
        h2.add("user-agent", "b");
        let out = String::from_utf8(h2.serialize("")).unwrap();
        assert_eq!(out, "USER-AGENT: b\r\n\r\n");
    }
}
