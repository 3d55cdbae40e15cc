/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::time::Duration;

use chrono::{DateTime, Utc};
use http::header;

use super::Header;

#[derive(Clone, Debug, Default)]
pub struct ResponseHeader {
    inner: Header,
}

impl From<Header> for ResponseHeader {
    fn from(inner: Header) -> Self {
        ResponseHeader { inner }
    }
}

impl ResponseHeader {
    #[inline]
    pub fn header(&self) -> &Header {
        &self.inner
    }

    #[inline]
    pub fn header_mut(&mut self) -> &mut Header {
        &mut self.inner
    }

    pub fn into_header(self) -> Header {
        self.inner
    }

    pub fn date(&self) -> Option<DateTime<Utc>> {
        self.inner.date_value(header::DATE.as_str())
    }

    pub fn set_date(&mut self, dt: &DateTime<Utc>) {
        self.inner.put_date(header::DATE.as_str(), dt);
    }

    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.inner.date_value(header::LAST_MODIFIED.as_str())
    }

    pub fn expires(&self) -> Option<DateTime<Utc>> {
        self.inner.date_value(header::EXPIRES.as_str())
    }

    /// Whether Cache-Control or Pragma contains the directive.
    pub fn has_cache_directive(&self, directive: &str) -> bool {
        self.cache_directives()
            .any(|(k, _)| k.eq_ignore_ascii_case(directive))
            || (directive.eq_ignore_ascii_case("no-cache")
                && self
                    .inner
                    .get(header::PRAGMA.as_str())
                    .map(|v| v.to_ascii_lowercase().contains("no-cache"))
                    .unwrap_or(false))
    }

    pub fn max_age(&self) -> Option<Duration> {
        self.cache_directives().find_map(|(k, v)| {
            if k.eq_ignore_ascii_case("max-age") {
                v.and_then(|v| v.trim_matches('"').parse::<u64>().ok())
                    .map(Duration::from_secs)
            } else {
                None
            }
        })
    }

    fn cache_directives(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.inner
            .get_multiple(header::CACHE_CONTROL.as_str())
            .into_iter()
            .flat_map(|v| v.split(','))
            .filter_map(|d| {
                let d = d.trim();
                if d.is_empty() {
                    return None;
                }
                match d.split_once('=') {
                    Some((k, v)) => Some((k.trim(), Some(v.trim()))),
                    None => Some((d, None)),
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dates() {
        let mut h = Header::new();
        h.add("Last-Modified", "Sun, 06 Nov 1994 08:49:37 GMT");
        h.add("Expires", "0");
        let mut rsp = ResponseHeader::from(h);
        assert_eq!(rsp.last_modified().unwrap().timestamp(), 784111777);
        assert!(rsp.expires().is_none());
        assert!(rsp.date().is_none());

        let now = DateTime::from_timestamp(784111777, 0).unwrap();
        rsp.set_date(&now);
        assert_eq!(rsp.header().get("date"), Some("Sun, 06 Nov 1994 08:49:37 GMT"));
    }

    #[test]
    fn cache_control() {
        let mut h = Header::new();
        h.add("Cache-Control", "public, max-age=600");
        h.add("Cache-Control", "No-Store");
        let rsp = ResponseHeader::from(h);
        assert_eq!(rsp.max_age(), Some(Duration::from_secs(600)));
        assert!(rsp.has_cache_directive("no-store"));
        assert!(!rsp.has_cache_directive("private"));
        assert!(!rsp.has_cache_directive("no-cache"));

        let mut h = Header::new();
        h.add("Pragma", "no-cache");
        let rsp = ResponseHeader::from(h);
        assert!(rsp.has_cache_directive("no-cache"));
        assert!(rsp.max_age().is_none());
    }
}
