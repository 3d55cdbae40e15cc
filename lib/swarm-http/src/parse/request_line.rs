/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::str::FromStr;

use super::HttpLineParseError;
use crate::HttpVersion;

pub struct HttpRequestLine<'a> {
    pub method: &'a str,
    pub target: &'a str,
    pub version: HttpVersion,
}

impl<'a> HttpRequestLine<'a> {
    /// Parse the request line, the version is HTTP/0.9 if absent.
    pub fn parse(buf: &'a [u8]) -> Result<HttpRequestLine<'a>, HttpLineParseError> {
        let line = std::str::from_utf8(buf)?;
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            return Err(HttpLineParseError::NotLongEnough);
        }
        if line.starts_with([' ', '\t']) {
            return Err(HttpLineParseError::MissingMethod);
        }

        let mut iter = line.split_ascii_whitespace();
        let Some(method) = iter.next() else {
            return Err(HttpLineParseError::MissingMethod);
        };
        let Some(target) = iter.next() else {
            return Err(HttpLineParseError::MissingTarget);
        };
        let version = match iter.next() {
            Some(s) => HttpVersion::from_str(s)?,
            None => HttpVersion::Http09,
        };
        if iter.next().is_some() {
            return Err(HttpLineParseError::InvalidVersion);
        }

        Ok(HttpRequestLine {
            method,
            target,
            version,
        })
    }

    /// A line with only line ending, some clients send it before the real request.
    #[inline]
    pub fn is_empty_line(buf: &[u8]) -> bool {
        buf.iter().all(|b| matches!(b, b'\r' | b'\n'))
    }
}
