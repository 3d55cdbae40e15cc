/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::net::SocketAddr;

use http::header;

use super::{CLIENT_ADDR_PROPERTY, Header};
use crate::date::HttpDateOrRaw;

#[derive(Clone, Debug, Default)]
pub struct RequestHeader {
    inner: Header,
}

impl From<Header> for RequestHeader {
    fn from(inner: Header) -> Self {
        RequestHeader { inner }
    }
}

impl RequestHeader {
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

    /// The peer address the request was received from.
    pub fn client_addr(&self) -> Option<SocketAddr> {
        self.inner.property(CLIENT_ADDR_PROPERTY)?.parse().ok()
    }

    pub fn set_client_addr(&mut self, addr: SocketAddr) {
        self.inner
            .set_property(CLIENT_ADDR_PROPERTY, addr.to_string());
    }

    pub fn host(&self) -> Option<&str> {
        self.inner.get(header::HOST.as_str()).map(str::trim)
    }

    pub fn referer(&self) -> Option<&str> {
        self.inner.get(header::REFERER.as_str())
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.inner.get(header::USER_AGENT.as_str())
    }

    pub fn if_modified_since(&self) -> Option<HttpDateOrRaw> {
        self.inner.date_or_raw(header::IF_MODIFIED_SINCE.as_str())
    }

    pub fn if_range(&self) -> Option<HttpDateOrRaw> {
        self.inner.date_or_raw(header::IF_RANGE.as_str())
    }

    /// All name and value pairs of the Cookie headers.
    pub fn cookies(&self) -> Vec<(&str, &str)> {
        self.inner
            .get_multiple(header::COOKIE.as_str())
            .into_iter()
            .flat_map(|v| v.split(';'))
            .filter_map(|p| {
                let p = p.trim();
                if p.is_empty() {
                    return None;
                }
                match p.split_once('=') {
                    Some((k, v)) => Some((k.trim(), v.trim())),
                    None => Some((p, "")),
                }
            })
            .collect()
    }

    /// The X-Forwarded-For chain, client first.
    pub fn forwarded_for(&self) -> Vec<&str> {
        self.inner
            .get_multiple("X-Forwarded-For")
            .into_iter()
            .flat_map(|v| v.split(','))
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .collect()
    }

    pub fn append_forwarded_for(&mut self, addr: &str) {
        let value = match self.inner.get("X-Forwarded-For") {
            Some(v) if !v.trim().is_empty() => format!("{}, {addr}", v.trim()),
            _ => addr.to_string(),
        };
        self.inner.put("X-Forwarded-For", value);
    }

    /// The lower-cased transfer codings, last applied last.
    pub fn transfer_codings(&self) -> Vec<String> {
        self.inner
            .get_multiple(header::TRANSFER_ENCODING.as_str())
            .into_iter()
            .flat_map(|v| v.split(','))
            .map(|v| v.trim().to_ascii_lowercase())
            .filter(|v| !v.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors() {
        let mut h = Header::new();
        h.add("Host", " a.example ");
        h.add("Referer", "http://b.example/");
        h.add("If-Modified-Since", "Sun, 06 Nov 1994 08:49:37 GMT");
        h.add("If-Range", "\"abc\"");
        let req = RequestHeader::from(h);
        assert_eq!(req.host(), Some("a.example"));
        assert_eq!(req.referer(), Some("http://b.example/"));
        assert!(req.if_modified_since().unwrap().date().is_some());
        assert_eq!(
            req.if_range(),
            Some(HttpDateOrRaw::Raw("\"abc\"".to_string()))
        );
        assert!(req.user_agent().is_none());
    }

    #[test]
    fn cookies() {
        let mut h = Header::new();
        h.add("Cookie", "a=1; b=2");
        h.add("Cookie", "c");
        let req = RequestHeader::from(h);
        assert_eq!(req.cookies(), vec![("a", "1"), ("b", "2"), ("c", "")]);
    }

    #[test]
    fn forwarded_for() {
        let mut req = RequestHeader::default();
        req.append_forwarded_for("192.0.2.1");
        req.append_forwarded_for("192.0.2.2");
        assert_eq!(req.forwarded_for(), vec!["192.0.2.1", "192.0.2.2"]);
        assert_eq!(req.header().key_count("x-forwarded-for"), 1);
    }

    #[test]
    fn transfer_codings() {
        let mut h = Header::new();
        h.add("Transfer-Encoding", "gzip, Chunked");
        let req = RequestHeader::from(h);
        assert_eq!(req.transfer_codings(), vec!["gzip", "chunked"]);
    }
}
