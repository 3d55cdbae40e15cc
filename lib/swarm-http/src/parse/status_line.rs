/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::str::FromStr;

use http::StatusCode;

use super::HttpLineParseError;
use crate::HttpVersion;

pub struct HttpStatusLine<'a> {
    pub version: HttpVersion,
    pub code: u16,
    pub reason: &'a str,
}

impl<'a> HttpStatusLine<'a> {
    pub fn parse(buf: &'a [u8]) -> Result<HttpStatusLine<'a>, HttpLineParseError> {
        let line = std::str::from_utf8(buf)?;
        let line = line.trim_end_matches(['\r', '\n']);

        let Some(p) = memchr::memchr(b' ', line.as_bytes()) else {
            return Err(HttpLineParseError::NoDelimiterFound(' '));
        };
        let version = HttpVersion::from_str(&line[0..p])?;

        let left = line[p + 1..].trim_start();
        let (code, reason) = match memchr::memchr(b' ', left.as_bytes()) {
            Some(p) => (&left[0..p], left[p + 1..].trim()),
            None => (left, ""),
        };
        let code = parse_status_code(code)?;

        Ok(HttpStatusLine {
            version,
            code,
            reason,
        })
    }

    /// Render a status line without the line ending.
    pub fn format(version: HttpVersion, status: StatusCode) -> String {
        let reason = status.canonical_reason().unwrap_or("Unknown");
        format!("{version} {:03} {reason}", status.as_u16())
    }
}

fn parse_status_code(s: &str) -> Result<u16, HttpLineParseError> {
    if s.len() != 3 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(HttpLineParseError::InvalidStatusCode);
    }
    let code = u16::from_str(s).map_err(|_| HttpLineParseError::InvalidStatusCode)?;
    if code < 100 {
        return Err(HttpLineParseError::InvalidStatusCode);
    }
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse() {
        let rsp = HttpStatusLine::parse(b"HTTP/1.1 200 OK\r\n").unwrap();
        assert_eq!(rsp.version, HttpVersion::Http11);
        assert_eq!(rsp.code, 200);
        assert_eq!(rsp.reason, "OK");

        let rsp = HttpStatusLine::parse(b"HTTP/1.0 404 Not Found\r\n").unwrap();
        assert_eq!(rsp.code, 404);
        assert_eq!(rsp.reason, "Not Found");

        let rsp = HttpStatusLine::parse(b"HTTP/1.1 204\r\n").unwrap();
        assert_eq!(rsp.code, 204);
        assert_eq!(rsp.reason, "");
    }

    #[test]
    fn invalid_code() {
        assert!(HttpStatusLine::parse(b"HTTP/1.1 20 OK\r\n").is_err());
        assert!(HttpStatusLine::parse(b"HTTP/1.1 2000 OK\r\n").is_err());
        assert!(HttpStatusLine::parse(b"HTTP/1.1 abc OK\r\n").is_err());
        assert!(HttpStatusLine::parse(b"HTTP/1.1 099 OK\r\n").is_err());
        assert!(HttpStatusLine::parse(b"HTTP/1.1\r\n").is_err());
    }

    #[test]
    fn format() {
        assert_eq!(
            HttpStatusLine::format(HttpVersion::Http11, StatusCode::OK),
            "HTTP/1.1 200 OK"
        );
        assert_eq!(
            HttpStatusLine::format(HttpVersion::Http10, StatusCode::NOT_MODIFIED),
            "HTTP/1.0 304 Not Modified"
        );
    }
}
