/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::str::FromStr;

use http::Method;
use url::Url;

use swarm_http::body::HttpBodyType;
use swarm_http::header::{Header, RequestHeader};
use swarm_http::{HttpLineParseError, HttpProtocolError, HttpRequestLine, HttpVersion};

use super::{ServerTaskError, ServerTaskResult};
use crate::upstream::UpstreamAddr;

const ACCEPTED_METHODS: &[Method] = &[
    Method::GET,
    Method::HEAD,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::OPTIONS,
    Method::CONNECT,
    Method::PATCH,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetForm {
    /// `/path?query`
    Origin,
    /// `http://host:port/path?query`
    Absolute,
    /// `host:port`, for CONNECT only
    Authority,
    /// `*`
    Asterisk,
}

pub struct HttpRequest {
    pub method: Method,
    pub target: String,
    pub version: HttpVersion,
    pub form: TargetForm,
    pub header: RequestHeader,
    pub path: String,
    pub query: Option<String>,
    pub upstream: Option<UpstreamAddr>,
    pub body_type: Option<HttpBodyType>,
}

fn invalid_target() -> ServerTaskError {
    ServerTaskError::InvalidClientProtocol(HttpProtocolError::InvalidRequestLine(
        HttpLineParseError::MissingTarget,
    ))
}

impl HttpRequest {
    /// Parse the request line, the header is filled later by `set_header`.
    pub fn parse_line(buf: &[u8]) -> ServerTaskResult<Self> {
        let line = HttpRequestLine::parse(buf)
            .map_err(|e| ServerTaskError::InvalidClientProtocol(HttpProtocolError::InvalidRequestLine(e)))?;

        let method = Method::from_str(line.method)
            .ok()
            .filter(|m| ACCEPTED_METHODS.contains(m))
            .ok_or_else(|| ServerTaskError::UnimplementedMethod(line.method.to_string()))?;

        let mut req = HttpRequest {
            method,
            target: line.target.to_string(),
            version: line.version,
            form: TargetForm::Origin,
            header: RequestHeader::default(),
            path: String::new(),
            query: None,
            upstream: None,
            body_type: None,
        };
        req.parse_target()?;
        Ok(req)
    }

    fn parse_target(&mut self) -> ServerTaskResult<()> {
        if self.method == Method::CONNECT {
            let upstream =
                UpstreamAddr::from_authority(&self.target, 443).map_err(|_| invalid_target())?;
            self.form = TargetForm::Authority;
            self.upstream = Some(upstream);
            return Ok(());
        }

        if self.target == "*" {
            self.form = TargetForm::Asterisk;
            self.path = self.target.clone();
            return Ok(());
        }

        if self.target.starts_with('/') {
            match self.target.split_once('?') {
                Some((path, query)) => {
                    self.path = path.to_string();
                    self.query = Some(query.to_string());
                }
                None => self.path = self.target.clone(),
            }
            return Ok(());
        }

        let is_http = self
            .target
            .get(0..7)
            .map(|p| p.eq_ignore_ascii_case("http://"))
            .unwrap_or(false);
        if !is_http {
            return Err(invalid_target());
        }
        let url = Url::parse(&self.target).map_err(|_| invalid_target())?;
        let Some(host) = url.host_str() else {
            return Err(invalid_target());
        };
        self.upstream = Some(UpstreamAddr::new(
            host.trim_matches(['[', ']']),
            url.port_or_known_default().unwrap_or(80),
        ));
        self.form = TargetForm::Absolute;
        self.path = url.path().to_string();
        self.query = url.query().map(|q| q.to_string());
        Ok(())
    }

    /// Take the parsed header, detect the body framing and the Host.
    pub fn set_header(&mut self, header: Header) -> ServerTaskResult<()> {
        self.body_type = HttpBodyType::detect_request(&header)?;
        self.header = RequestHeader::from(header);
        if self.form == TargetForm::Origin
            && let Some(host) = self.header.host()
            && !host.is_empty()
        {
            let upstream = UpstreamAddr::from_authority(host, 80).map_err(|_| {
                ServerTaskError::InvalidClientProtocol(HttpProtocolError::InvalidHeaderLine(
                    HttpLineParseError::InvalidHeaderName,
                ))
            })?;
            self.upstream = Some(upstream);
        }
        Ok(())
    }

    /// The host the client asked for, from the target or the Host header.
    pub fn host(&self) -> Option<&str> {
        match self.form {
            TargetForm::Origin | TargetForm::Asterisk => self.header.host(),
            TargetForm::Absolute | TargetForm::Authority => {
                self.upstream.as_ref().map(|u| u.host())
            }
        }
    }

    /// The lower-cased extension of the last path segment.
    pub fn extension(&self) -> Option<String> {
        let name = self.path.rsplit('/').next()?;
        let (_, ext) = name.rsplit_once('.')?;
        if ext.is_empty() {
            None
        } else {
            Some(ext.to_ascii_lowercase())
        }
    }

    /// The absolute url of a proxied request.
    pub fn url(&self) -> Option<Url> {
        let upstream = self.upstream.as_ref()?;
        let mut s = format!("http://{}{}", upstream.host_header_value(80), self.path);
        if let Some(query) = &self.query {
            s.push('?');
            s.push_str(query);
        }
        Url::parse(&s).ok()
    }

    /// The request target sent to the upstream.
    pub fn origin_form_target(&self) -> String {
        let mut s = if self.path.is_empty() {
            "/".to_string()
        } else {
            self.path.clone()
        };
        if let Some(query) = &self.query {
            s.push('?');
            s.push_str(query);
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin() {
        let mut req = HttpRequest::parse_line(b"GET /a/x.HTML?b=c HTTP/1.1\r\n").unwrap();
        assert_eq!(req.form, TargetForm::Origin);
        assert_eq!(req.path, "/a/x.HTML");
        assert_eq!(req.query.as_deref(), Some("b=c"));
        assert_eq!(req.extension().as_deref(), Some("html"));
        assert!(req.upstream.is_none());

        let mut h = Header::new();
        h.add("Host", "a.example:8080");
        req.set_header(h).unwrap();
        assert_eq!(req.host(), Some("a.example:8080"));
        let upstream = req.upstream.as_ref().unwrap();
        assert_eq!(upstream.port(), 8080);
        assert_eq!(req.url().unwrap().as_str(), "http://a.example:8080/a/x.HTML?b=c");
        assert_eq!(req.origin_form_target(), "/a/x.HTML?b=c");
    }

    #[test]
    fn absolute() {
        let req = HttpRequest::parse_line(b"GET http://A.example/x HTTP/1.0\r\n").unwrap();
        assert_eq!(req.form, TargetForm::Absolute);
        assert_eq!(req.host(), Some("a.example"));
        assert_eq!(req.upstream.as_ref().unwrap().port(), 80);
        assert_eq!(req.origin_form_target(), "/x");

        assert!(HttpRequest::parse_line(b"GET https://a.example/ HTTP/1.1\r\n").is_err());
        assert!(HttpRequest::parse_line(b"GET a.example HTTP/1.1\r\n").is_err());
    }

    #[test]
    fn connect() {
        let req = HttpRequest::parse_line(b"CONNECT a.example:443 HTTP/1.1\r\n").unwrap();
        assert_eq!(req.form, TargetForm::Authority);
        assert_eq!(req.upstream.as_ref().unwrap().to_string(), "a.example:443");
    }

    #[test]
    fn method() {
        match HttpRequest::parse_line(b"BREW /pot HTTP/1.1\r\n") {
            Err(ServerTaskError::UnimplementedMethod(m)) => assert_eq!(m, "BREW"),
            _ => panic!("expected unimplemented method"),
        }
        assert!(matches!(
            HttpRequest::parse_line(b"TRACE / HTTP/1.1\r\n"),
            Err(ServerTaskError::UnimplementedMethod(_))
        ));

        let req = HttpRequest::parse_line(b"GET /index.html\r\n").unwrap();
        assert_eq!(req.version, HttpVersion::Http09);
    }

    #[test]
    fn transfer_coding() {
        let mut req = HttpRequest::parse_line(b"POST /submit HTTP/1.1\r\n").unwrap();
        let mut h = Header::new();
        h.add("Transfer-Encoding", "gzip");
        let e = req.set_header(h).unwrap_err();
        assert_eq!(e.status_code(), Some(http::StatusCode::NOT_IMPLEMENTED));

        let mut h = Header::new();
        h.add("Transfer-Encoding", "chunked");
        req.set_header(h).unwrap();
        assert_eq!(req.body_type, Some(HttpBodyType::Chunked));
    }
}
