/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::str::FromStr;

use base64::prelude::*;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthParseError {
    #[error("unsupported auth type")]
    UnsupportedAuthType,
    #[error("invalid base64 encoding")]
    InvalidBase64Encoding,
    #[error("invalid utf-8 encoding")]
    InvalidUtf8Encoding,
    #[error("no delimiter found")]
    NoDelimiterFound,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpBasicAuth {
    pub username: String,
    pub password: String,
}

impl HttpBasicAuth {
    pub fn new(username: &str, password: &str) -> Self {
        HttpBasicAuth {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    pub fn encoded_value(&self) -> String {
        let mut buf = Vec::with_capacity(self.username.len() + 1 + self.password.len());
        buf.extend_from_slice(self.username.as_bytes());
        buf.push(b':');
        buf.extend_from_slice(self.password.as_bytes());
        BASE64_STANDARD.encode(buf)
    }

    /// Parse an Authorization or Proxy-Authorization value.
    ///
    /// Ok(None) is returned for other schemes.
    pub fn from_authorization(value: &str) -> Result<Option<Self>, AuthParseError> {
        let value = value.trim();
        match memchr::memchr(b' ', value.as_bytes()) {
            Some(i) => {
                if value[0..i].eq_ignore_ascii_case("basic") {
                    HttpBasicAuth::from_str(&value[i + 1..]).map(Some)
                } else {
                    Ok(None)
                }
            }
            None => Err(AuthParseError::UnsupportedAuthType),
        }
    }
}

impl FromStr for HttpBasicAuth {
    type Err = AuthParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decoded = BASE64_STANDARD
            .decode(s.trim())
            .map_err(|_| AuthParseError::InvalidBase64Encoding)?;
        let value =
            std::str::from_utf8(&decoded).map_err(|_| AuthParseError::InvalidUtf8Encoding)?;

        match memchr::memchr(b':', value.as_bytes()) {
            Some(i) => Ok(HttpBasicAuth::new(&value[0..i], &value[i + 1..])),
            None => Err(AuthParseError::NoDelimiterFound),
        }
    }
}

pub fn proxy_authenticate_basic(realm: &str) -> String {
    format!("Basic realm=\"{realm}\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ok() {
        let auth = HttpBasicAuth::from_authorization("Basic cm9vdDp0b29y")
            .unwrap()
            .unwrap();
        assert_eq!(auth.username, "root");
        assert_eq!(auth.password, "toor");
        assert_eq!(auth.encoded_value(), "cm9vdDp0b29y");
    }

    #[test]
    fn parse_other_scheme() {
        assert!(HttpBasicAuth::from_authorization("Bearer abc")
            .unwrap()
            .is_none());
    }

    #[test]
    fn parse_invalid() {
        assert_eq!(
            HttpBasicAuth::from_authorization("Basic"),
            Err(AuthParseError::UnsupportedAuthType)
        );
        assert_eq!(
            HttpBasicAuth::from_authorization("Basic !!!"),
            Err(AuthParseError::InvalidBase64Encoding)
        );
        // "root" without password delimiter
        assert_eq!(
            HttpBasicAuth::from_authorization("basic cm9vdA=="),
            Err(AuthParseError::NoDelimiterFound)
        );
    }

    #[test]
    fn special_chars() {
        let auth = HttpBasicAuth::new("user@domain", "p@ss:w0rd");
        assert_eq!(auth.encoded_value(), "dXNlckBkb21haW46cEBzczp3MHJk");
        let parsed = HttpBasicAuth::from_str("dXNlckBkb21haW46cEBzczp3MHJk").unwrap();
        assert_eq!(parsed, auth);
    }
}
