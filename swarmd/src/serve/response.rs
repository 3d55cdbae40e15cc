/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::io;
use std::time::Duration;

use chrono::Utc;
use http::StatusCode;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use swarm_http::body::{ChunkedEncodeWriter, HttpBodyType};
use swarm_http::header::Header;
use swarm_http::{HttpStatusLine, HttpVersion};
use swarm_io_ext::SizeLimitedWriter;

use super::origin::html_escape;
use crate::cache::StoreDenyReason;

const COPY_BUFFER_SIZE: usize = 16384;

/// Hop-by-hop headers, never passed through.
pub(crate) const HOP_BY_HOP_HEADERS: &[&str] = &[
    "Connection",
    "Proxy-Connection",
    "Keep-Alive",
    "Proxy-Authorization",
    "Proxy-Authenticate",
    "TE",
    "Trailer",
    "Transfer-Encoding",
    "Upgrade",
];

/// Remove hop-by-hop headers, including the ones listed in Connection.
pub(crate) fn strip_hop_by_hop(header: &mut Header) {
    let listed = header
        .get_multiple(http::header::CONNECTION.as_str())
        .into_iter()
        .flat_map(|v| v.split(','))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect::<Vec<_>>();
    for name in listed {
        header.remove(&name);
    }
    for name in HOP_BY_HOP_HEADERS {
        header.remove(name);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ResponseFraming {
    Empty,
    ContentLength(u64),
    Chunked,
    UntilClose,
}

impl ResponseFraming {
    /// Framing of a body sent to a client of `version`.
    pub(crate) fn select(version: HttpVersion, body: Option<HttpBodyType>) -> Self {
        if version == HttpVersion::Http09 {
            return ResponseFraming::UntilClose;
        }
        match body {
            None => ResponseFraming::Empty,
            Some(HttpBodyType::ContentLength(n)) => ResponseFraming::ContentLength(n),
            Some(HttpBodyType::Chunked | HttpBodyType::ReadUntilEnd) => {
                if version == HttpVersion::Http11 {
                    ResponseFraming::Chunked
                } else {
                    ResponseFraming::UntilClose
                }
            }
        }
    }

    pub(crate) fn apply(&self, header: &mut Header) {
        header.remove(http::header::TRANSFER_ENCODING.as_str());
        match self {
            ResponseFraming::ContentLength(n) => header.set_content_length(*n),
            ResponseFraming::Chunked => {
                header.remove(http::header::CONTENT_LENGTH.as_str());
                header.put("Transfer-Encoding", "chunked");
            }
            ResponseFraming::UntilClose => {
                header.remove(http::header::CONTENT_LENGTH.as_str());
            }
            ResponseFraming::Empty => {}
        }
    }
}

/// Status line and header of a response to the client.
pub(crate) struct ResponseHead {
    version: HttpVersion,
    status_line: String,
    pub(crate) header: Header,
    pub(crate) keep_alive: bool,
}

impl ResponseHead {
    pub(crate) fn new(version: HttpVersion, status: StatusCode, header: Header, keep_alive: bool) -> Self {
        ResponseHead {
            version,
            status_line: HttpStatusLine::format(status_line_version(version), status),
            header,
            keep_alive,
        }
    }

    /// Keep the upstream reason phrase.
    pub(crate) fn with_reason(
        version: HttpVersion,
        status: StatusCode,
        reason: &str,
        header: Header,
        keep_alive: bool,
    ) -> Self {
        let reason = if reason.is_empty() {
            status.canonical_reason().unwrap_or("Unknown")
        } else {
            reason
        };
        ResponseHead {
            version,
            status_line: format!(
                "{} {:03} {reason}",
                status_line_version(version),
                status.as_u16()
            ),
            header,
            keep_alive,
        }
    }

    /// Empty for HTTP/0.9, which has no response head.
    pub(crate) fn serialize(&mut self, server_name: &str) -> Vec<u8> {
        if self.version == HttpVersion::Http09 {
            return Vec::new();
        }
        if !self.header.contains(http::header::DATE.as_str()) {
            self.header.put_date(http::header::DATE.as_str(), &Utc::now());
        }
        if !self.header.contains(http::header::SERVER.as_str()) {
            self.header.put("Server", server_name);
        }
        self.header.remove("Connection");
        self.header.remove("Proxy-Connection");
        match (self.version, self.keep_alive) {
            (HttpVersion::Http11, true) => {}
            _ => self.header.put("Connection", "close"),
        }
        self.header.serialize(&self.status_line)
    }
}

fn status_line_version(version: HttpVersion) -> HttpVersion {
    match version {
        HttpVersion::Http09 => HttpVersion::Http10,
        v => v,
    }
}

pub(crate) async fn write_full_response<W>(
    writer: &mut W,
    mut head: ResponseHead,
    body: &[u8],
    method_is_head: bool,
    server_name: &str,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    if !head.header.contains(http::header::CONTENT_LENGTH.as_str()) {
        head.header.set_content_length(body.len() as u64);
    }
    head.header.remove(http::header::TRANSFER_ENCODING.as_str());
    let mut buf = head.serialize(server_name);
    if !method_is_head {
        buf.extend_from_slice(body);
    }
    writer.write_all(&buf).await?;
    writer.flush().await
}

/// A short html page for error replies.
pub(crate) fn error_page(status: StatusCode, detail: &str) -> (Header, Vec<u8>) {
    let reason = status.canonical_reason().unwrap_or("Unknown");
    let body = format!(
        "<html><head><title>{code} {reason}</title></head><body><h1>{code} {reason}</h1><p>{}</p></body></html>\r\n",
        html_escape(detail),
        code = status.as_u16(),
    );
    let mut header = Header::new();
    header.put("Content-Type", "text/html; charset=utf-8");
    header.put("Cache-Control", "no-cache");
    (header, body.into_bytes())
}

#[derive(Debug)]
pub(crate) enum BodyCopyError {
    ReadFailed(io::Error),
    ReadTimeout,
    WriteFailed(io::Error),
}

/// Collects a copy of the body for the cache, until it grows too large.
pub(crate) struct BodyTee {
    writer: SizeLimitedWriter<Vec<u8>>,
    overflow: bool,
}

impl BodyTee {
    pub(crate) fn new(limit: u64) -> Self {
        BodyTee {
            writer: SizeLimitedWriter::new(Vec::new(), limit),
            overflow: false,
        }
    }

    async fn feed(&mut self, data: &[u8]) {
        if self.overflow {
            return;
        }
        if self.writer.write_all(data).await.is_err() {
            self.overflow = true;
        }
    }

    /// The collected body, if it is whole and within the limit.
    pub(crate) fn into_body(self, finished: bool) -> Result<Vec<u8>, StoreDenyReason> {
        if self.overflow {
            Err(StoreDenyReason::TooLarge(self.writer.limit()))
        } else if !finished {
            Err(StoreDenyReason::Incomplete)
        } else {
            Ok(self.writer.into_inner())
        }
    }
}

enum BodySink<'a, W> {
    Plain(&'a mut W),
    Chunked(ChunkedEncodeWriter<&'a mut W>),
}

impl<W> BodySink<'_, W>
where
    W: AsyncWrite + Unpin,
{
    async fn write(&mut self, data: &[u8]) -> io::Result<()> {
        match self {
            BodySink::Plain(w) => w.write_all(data).await,
            BodySink::Chunked(w) => w.write_chunk(data).await,
        }
    }

    async fn finish(&mut self) -> io::Result<()> {
        match self {
            BodySink::Plain(w) => w.flush().await,
            BodySink::Chunked(w) => w.finish().await,
        }
    }
}

/// Copy a body, writing chunked framing if `chunked` is set.
///
/// Each read is bounded by `read_timeout`.
pub(crate) async fn copy_body<R, W>(
    reader: &mut R,
    writer: &mut W,
    chunked: bool,
    mut tee: Option<&mut BodyTee>,
    read_timeout: Duration,
) -> Result<u64, BodyCopyError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut sink = if chunked {
        BodySink::Chunked(ChunkedEncodeWriter::new(writer))
    } else {
        BodySink::Plain(writer)
    };
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    let mut total = 0u64;
    loop {
        let nr = match tokio::time::timeout(read_timeout, reader.read(&mut buf)).await {
            Ok(Ok(nr)) => nr,
            Ok(Err(e)) => return Err(BodyCopyError::ReadFailed(e)),
            Err(_) => return Err(BodyCopyError::ReadTimeout),
        };
        if nr == 0 {
            break;
        }
        let data = &buf[..nr];
        if let Some(tee) = tee.as_deref_mut() {
            tee.feed(data).await;
        }
        sink.write(data).await.map_err(BodyCopyError::WriteFailed)?;
        total += nr as u64;
    }
    sink.finish().await.map_err(BodyCopyError::WriteFailed)?;
    Ok(total)
}
