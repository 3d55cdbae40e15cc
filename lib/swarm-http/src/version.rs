/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::fmt;
use std::str::FromStr;

use crate::HttpLineParseError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HttpVersion {
    Http09,
    Http10,
    Http11,
}

impl HttpVersion {
    pub const fn as_str(&self) -> &'static str {
        match self {
            HttpVersion::Http09 => "HTTP/0.9",
            HttpVersion::Http10 => "HTTP/1.0",
            HttpVersion::Http11 => "HTTP/1.1",
        }
    }

    /// Whether the connection is persistent when no Connection header is present.
    #[inline]
    pub fn default_keep_alive(&self) -> bool {
        matches!(self, HttpVersion::Http11)
    }

    #[inline]
    pub fn has_header(&self) -> bool {
        !matches!(self, HttpVersion::Http09)
    }
}

impl FromStr for HttpVersion {
    type Err = HttpLineParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let b = s.as_bytes();
        if b.len() != 8 || !b[0..5].eq_ignore_ascii_case(b"HTTP/") {
            return Err(HttpLineParseError::InvalidVersion);
        }
        match &b[5..] {
            b"0.9" => Ok(HttpVersion::Http09),
            b"1.0" => Ok(HttpVersion::Http10),
            b"1.1" => Ok(HttpVersion::Http11),
            _ => Err(HttpLineParseError::UnsupportedVersion(s.to_string())),
        }
    }
}

impl fmt::Display for HttpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse() {
        assert_eq!(HttpVersion::from_str("HTTP/1.1").unwrap(), HttpVersion::Http11);
        assert_eq!(HttpVersion::from_str("http/1.0").unwrap(), HttpVersion::Http10);
        assert_eq!(HttpVersion::from_str("HTTP/0.9").unwrap(), HttpVersion::Http09);
        assert!(matches!(
            HttpVersion::from_str("HTTP/2.0"),
            Err(HttpLineParseError::UnsupportedVersion(_))
        ));
        assert!(matches!(
            HttpVersion::from_str("HTTX/1.1"),
            Err(HttpLineParseError::InvalidVersion)
        ));
    }
}
