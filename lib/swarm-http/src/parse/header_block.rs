/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use tokio::io::AsyncBufRead;

use swarm_io_ext::LimitedBufReadExt;

use super::HttpHeaderLine;
use crate::header::Header;
use crate::{HttpHeadReadError, HttpProtocolError};

/// Line fed header block parser, shared by message heads and chunked trailers.
pub struct HeaderBlockParser {
    header: Header,
    last_name: Option<String>,
}

impl HeaderBlockParser {
    pub fn new(header: Header) -> Self {
        HeaderBlockParser {
            header,
            last_name: None,
        }
    }

    /// Feed one complete line, returns true if it is the terminating blank line.
    pub fn feed_line(&mut self, line: &[u8]) -> Result<bool, HttpProtocolError> {
        if matches!(line, b"\r\n" | b"\n" | b"") {
            return Ok(true);
        }

        if HttpHeaderLine::is_continuation(line) {
            let Some(name) = &self.last_name else {
                return Err(HttpProtocolError::CorruptContinuation);
            };
            let more = std::str::from_utf8(line)
                .map_err(|_| HttpProtocolError::CorruptContinuation)?
                .trim();
            let extended = if name.eq_ignore_ascii_case("set-cookie") {
                self.header.extend_last_cookie(more)
            } else {
                self.header.extend_last_value(name, more)
            };
            if !extended {
                return Err(HttpProtocolError::CorruptContinuation);
            }
            return Ok(false);
        }

        let header = HttpHeaderLine::parse(line).map_err(HttpProtocolError::InvalidHeaderLine)?;
        self.header.add_parsed(header.name, header.value);
        self.last_name = Some(header.name.to_string());
        Ok(false)
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn finish(self) -> Header {
        self.header
    }
}

/// Read header lines into `header` until the blank line.
///
/// `max_size` limits the total size of the block, including line endings.
pub async fn read_header_block<R>(
    reader: &mut R,
    max_size: usize,
    header: Header,
) -> Result<Header, HttpHeadReadError>
where
    R: AsyncBufRead + Unpin,
{
    let mut parser = HeaderBlockParser::new(header);
    let mut line_buf = Vec::<u8>::with_capacity(128);
    let mut total = 0usize;

    loop {
        if total >= max_size {
            return Err(HttpProtocolError::TooLargeHeader(max_size).into());
        }
        line_buf.clear();
        let (found, nr) = reader
            .limited_read_until(b'\n', max_size - total, &mut line_buf)
            .await?;
        if nr == 0 {
            // the trailing blank line is optional at EOF
            return Ok(parser.finish());
        }
        total += nr;
        if !found {
            if total >= max_size {
                return Err(HttpProtocolError::TooLargeHeader(max_size).into());
            }
            return Err(HttpProtocolError::UnexpectedEof("header block").into());
        }
        if parser.feed_line(&line_buf)? {
            return Ok(parser.finish());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    #[test]
    fn feed_lines() {
        let mut parser = HeaderBlockParser::new(Header::new());
        assert!(!parser.feed_line(b"Host: a.example\r\n").unwrap());
        assert!(!parser.feed_line(b"Accept: text/html\r\n").unwrap());
        assert!(!parser.feed_line(b"  text/plain\r\n").unwrap());
        assert!(!parser.feed_line(b"Set-Cookie: a=1;\r\n").unwrap());
        assert!(!parser.feed_line(b"\tpath=/\r\n").unwrap());
        assert!(parser.feed_line(b"\r\n").unwrap());

        let header = parser.finish();
        assert_eq!(header.get("host"), Some("a.example"));
        assert_eq!(header.get("accept"), Some("text/html text/plain"));
        assert_eq!(header.cookies(), &["a=1; path=/".to_string()]);
        assert!(!header.contains("set-cookie"));
    }

    fn parse_block(block: &[u8]) -> Header {
        let mut parser = HeaderBlockParser::new(Header::new());
        for line in block.split_inclusive(|b| *b == b'\n') {
            if parser.feed_line(line).unwrap() {
                break;
            }
        }
        parser.finish()
    }

    #[test]
    fn star_in_names() {
        let block = b"A: 1\r\nA: 2\r\nA*1: x\r\nB: y\r\n\r\n";
        let header = parse_block(block);
        let pairs: Vec<String> = header.iter().map(|(k, v)| format!("{k}={v}")).collect();
        assert_eq!(pairs, ["A=1", "A=2", "A*1=x", "B=y"]);
        assert_eq!(header.get_multiple("a"), vec!["1", "2"]);
        assert_eq!(header.get("a*1"), Some("x"));
        assert_eq!(header.serialize(""), block);

        let block = b"*Foo: bar\r\n\r\n";
        let mut header = parse_block(block);
        header.set_property("foo", "hidden");
        assert_eq!(header.get("*foo"), Some("bar"));
        assert_eq!(header.serialize(""), block);
    }

    #[test]
    fn orphan_continuation() {
        let mut parser = HeaderBlockParser::new(Header::new());
        assert!(matches!(
            parser.feed_line(b" orphan\r\n"),
            Err(HttpProtocolError::CorruptContinuation)
        ));
    }

    #[test]
    fn invalid_line() {
        let mut parser = HeaderBlockParser::new(Header::new());
        assert!(matches!(
            parser.feed_line(b"no delimiter\r\n"),
            Err(HttpProtocolError::InvalidHeaderLine(_))
        ));
    }

    #[tokio::test]
    async fn read_block() {
        let stream = tokio_test::io::Builder::new()
            .read(b"Host: a.example\r\nVia: 1.1 a\r\n")
            .read(b"Via: 1.1 b\r\n\r\nbody")
            .build();
        let mut reader = BufReader::new(stream);

        let header = read_header_block(&mut reader, 4096, Header::new())
            .await
            .unwrap();
        assert_eq!(header.get_multiple("via"), vec!["1.1 a", "1.1 b"]);
        assert_eq!(
            header.serialize(""),
            b"Host: a.example\r\nVia: 1.1 a\r\nVia: 1.1 b\r\n\r\n".to_vec()
        );

        let mut left = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut reader, &mut left)
            .await
            .unwrap();
        assert_eq!(left.as_slice(), b"body");
    }

    #[tokio::test]
    async fn read_too_large() {
        let stream = tokio_test::io::Builder::new()
            .read(b"X-Long: 0123456789abcdef\r\n\r\n")
            .build();
        let mut reader = BufReader::new(stream);

        let e = read_header_block(&mut reader, 16, Header::new())
            .await
            .unwrap_err();
        assert!(matches!(
            e,
            HttpHeadReadError::Protocol(HttpProtocolError::TooLargeHeader(16))
        ));
    }

    #[tokio::test]
    async fn read_eof_without_blank() {
        let stream = tokio_test::io::Builder::new()
            .read(b"Host: a.example\r\n")
            .build();
        let mut reader = BufReader::new(stream);

        let header = read_header_block(&mut reader, 4096, Header::new())
            .await
            .unwrap();
        assert_eq!(header.get("host"), Some("a.example"));
    }
}
