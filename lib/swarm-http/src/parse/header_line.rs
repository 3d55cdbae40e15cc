/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use super::HttpLineParseError;

pub struct HttpHeaderLine<'a> {
    pub name: &'a str,
    pub value: &'a str,
}

impl<'a> HttpHeaderLine<'a> {
    pub fn parse(buf: &'a [u8]) -> Result<HttpHeaderLine<'a>, HttpLineParseError> {
        let line = std::str::from_utf8(buf)?;
        let Some(p) = memchr::memchr(b':', line.as_bytes()) else {
            return Err(HttpLineParseError::NoDelimiterFound(':'));
        };

        let name = line[0..p].trim();
        if name.is_empty() || name.bytes().any(|b| b.is_ascii_whitespace()) {
            return Err(HttpLineParseError::InvalidHeaderName);
        }
        let value = line[p + 1..].trim();

        Ok(HttpHeaderLine { name, value })
    }

    /// A line starting with space or tab continues the value of the previous header.
    #[inline]
    pub fn is_continuation(buf: &[u8]) -> bool {
        matches!(buf.first(), Some(b' ' | b'\t'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple() {
        let h = HttpHeaderLine::parse(b"Host: a.example\r\n").unwrap();
        assert_eq!(h.name, "Host");
        assert_eq!(h.value, "a.example");

        let h = HttpHeaderLine::parse(b"X-Empty:\r\n").unwrap();
        assert_eq!(h.name, "X-Empty");
        assert_eq!(h.value, "");

        let h = HttpHeaderLine::parse(b"Location: http://a.example:8080/\n").unwrap();
        assert_eq!(h.value, "http://a.example:8080/");
    }

    #[test]
    fn invalid() {
        assert!(HttpHeaderLine::parse(b"no delimiter\r\n").is_err());
        assert!(HttpHeaderLine::parse(b": value\r\n").is_err());
        assert!(HttpHeaderLine::parse(b"bad name: value\r\n").is_err());
    }

    #[test]
    fn continuation() {
        assert!(HttpHeaderLine::is_continuation(b" more\r\n"));
        assert!(HttpHeaderLine::is_continuation(b"\tmore\r\n"));
        assert!(!HttpHeaderLine::is_continuation(b"Name: v\r\n"));
        assert!(!HttpHeaderLine::is_continuation(b""));
    }
}
