/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UpstreamAddrParseError {
    #[error("empty host")]
    EmptyHost,
    #[error("invalid port")]
    InvalidPort,
    #[error("invalid ipv6 address")]
    InvalidIpv6,
}

/// The host and port of a remote peer.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct UpstreamAddr {
    host: String,
    port: u16,
}

impl UpstreamAddr {
    pub fn new(host: &str, port: u16) -> Self {
        UpstreamAddr {
            host: host.to_ascii_lowercase(),
            port,
        }
    }

    /// Parse `host[:port]`, using `default_port` if no port is present.
    pub fn from_authority(s: &str, default_port: u16) -> Result<Self, UpstreamAddrParseError> {
        let s = s.trim();
        if let Some(left) = s.strip_prefix('[') {
            let Some((ip, rest)) = left.split_once(']') else {
                return Err(UpstreamAddrParseError::InvalidIpv6);
            };
            if IpAddr::from_str(ip).is_err() {
                return Err(UpstreamAddrParseError::InvalidIpv6);
            }
            let port = match rest.strip_prefix(':') {
                Some(p) => u16::from_str(p).map_err(|_| UpstreamAddrParseError::InvalidPort)?,
                None if rest.is_empty() => default_port,
                None => return Err(UpstreamAddrParseError::InvalidPort),
            };
            return Ok(UpstreamAddr::new(ip, port));
        }

        let (host, port) = match s.rsplit_once(':') {
            Some((h, p)) => {
                let port = u16::from_str(p).map_err(|_| UpstreamAddrParseError::InvalidPort)?;
                (h, port)
            }
            None => (s, default_port),
        };
        if host.is_empty() {
            return Err(UpstreamAddrParseError::EmptyHost);
        }
        if port == 0 {
            return Err(UpstreamAddrParseError::InvalidPort);
        }
        Ok(UpstreamAddr::new(host, port))
    }

    #[inline]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[inline]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The value for the Host header, without the default port.
    pub fn host_header_value(&self, default_port: u16) -> String {
        let host = if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        if self.port == default_port {
            host
        } else {
            format!("{host}:{}", self.port)
        }
    }
}

impl fmt::Display for UpstreamAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authority() {
        let a = UpstreamAddr::from_authority("A.example:8080", 80).unwrap();
        assert_eq!(a.host(), "a.example");
        assert_eq!(a.port(), 8080);
        assert_eq!(a.to_string(), "a.example:8080");

        let a = UpstreamAddr::from_authority("a.example", 80).unwrap();
        assert_eq!(a.port(), 80);
        assert_eq!(a.host_header_value(80), "a.example");

        let a = UpstreamAddr::from_authority("[::1]:443", 80).unwrap();
        assert_eq!(a.host(), "::1");
        assert_eq!(a.to_string(), "[::1]:443");
        assert_eq!(a.host_header_value(80), "[::1]:443");

        assert_eq!(
            UpstreamAddr::from_authority(":80", 80),
            Err(UpstreamAddrParseError::EmptyHost)
        );
        assert_eq!(
            UpstreamAddr::from_authority("a.example:x", 80),
            Err(UpstreamAddrParseError::InvalidPort)
        );
        assert_eq!(
            UpstreamAddr::from_authority("[zz]:80", 80),
            Err(UpstreamAddrParseError::InvalidIpv6)
        );
    }
}
