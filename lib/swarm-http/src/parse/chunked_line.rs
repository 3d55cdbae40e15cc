/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use atoi::FromRadix16Checked;

use super::HttpLineParseError;

#[derive(Clone, Copy, PartialEq, Eq)]
enum SizeLineState {
    Normal,
    InExtension,
    CrSeen,
}

pub struct HttpChunkedLine<'a> {
    pub chunk_size: u64,
    pub extension: Option<&'a str>,
}

impl<'a> HttpChunkedLine<'a> {
    /// Parse a complete chunk size line, including the line ending.
    ///
    /// Only the hex digits seen before any extension delimiter make up the size,
    /// a bare LF is accepted as the line ending.
    pub fn parse(buf: &'a [u8]) -> Result<HttpChunkedLine<'a>, HttpLineParseError> {
        let mut state = SizeLineState::Normal;
        let mut size_end = 0usize;
        let mut ext_start: Option<usize> = None;
        let mut line_end: Option<usize> = None;

        for (i, b) in buf.iter().enumerate() {
            match state {
                SizeLineState::Normal => match b {
                    b';' | b'"' | b' ' | b'\t' => {
                        state = SizeLineState::InExtension;
                        ext_start = Some(i);
                    }
                    b'\r' => state = SizeLineState::CrSeen,
                    b'\n' => {
                        line_end = Some(i);
                        break;
                    }
                    _ => {
                        if !b.is_ascii_hexdigit() {
                            return Err(HttpLineParseError::InvalidChunkSize);
                        }
                        size_end = i + 1;
                    }
                },
                SizeLineState::InExtension => match b {
                    b'\r' => state = SizeLineState::CrSeen,
                    b'\n' => {
                        line_end = Some(i);
                        break;
                    }
                    _ => {}
                },
                SizeLineState::CrSeen => {
                    if *b == b'\n' {
                        line_end = Some(i);
                        break;
                    }
                    return Err(HttpLineParseError::InvalidLineEnding);
                }
            }
        }

        let Some(line_end) = line_end else {
            return Err(HttpLineParseError::NotLongEnough);
        };
        if size_end == 0 {
            return Err(HttpLineParseError::InvalidChunkSize);
        }
        let (chunk_size, offset) = u64::from_radix_16_checked(&buf[..size_end]);
        let Some(chunk_size) = chunk_size else {
            return Err(HttpLineParseError::InvalidChunkSize);
        };
        if offset != size_end {
            return Err(HttpLineParseError::InvalidChunkSize);
        }

        let extension = match ext_start {
            Some(p) => {
                let s = std::str::from_utf8(&buf[p..line_end])?;
                let s = s.trim_end_matches('\r').trim();
                let s = s.strip_prefix(';').unwrap_or(s).trim();
                if s.is_empty() { None } else { Some(s) }
            }
            None => None,
        };

        Ok(HttpChunkedLine {
            chunk_size,
            extension,
        })
    }
}
