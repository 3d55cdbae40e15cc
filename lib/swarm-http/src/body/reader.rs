/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use tokio::io::{AsyncBufRead, AsyncRead, AsyncReadExt, ReadBuf};

use super::{ChunkedDecodeReader, ContentLengthReader, HttpBodyType};
use crate::header::Header;

enum BodyInner<'a, R> {
    ContentLength(ContentLengthReader<'a, R>),
    Chunked(ChunkedDecodeReader<'a, R>),
    UntilEnd(&'a mut R, bool),
}

/// Read a message body of any framing as a plain stream.
pub struct HttpBodyReader<'a, R> {
    inner: BodyInner<'a, R>,
}

impl<'a, R> HttpBodyReader<'a, R>
where
    R: AsyncBufRead + Unpin,
{
    pub fn new(stream: &'a mut R, body_type: HttpBodyType, body_line_max_size: usize) -> Self {
        let inner = match body_type {
            HttpBodyType::ContentLength(size) => {
                BodyInner::ContentLength(ContentLengthReader::new(stream, size))
            }
            HttpBodyType::Chunked => {
                BodyInner::Chunked(ChunkedDecodeReader::new(stream, body_line_max_size))
            }
            HttpBodyType::ReadUntilEnd => BodyInner::UntilEnd(stream, false),
        };
        HttpBodyReader { inner }
    }

    pub fn finished(&self) -> bool {
        match &self.inner {
            BodyInner::ContentLength(r) => r.finished(),
            BodyInner::Chunked(r) => r.finished(),
            BodyInner::UntilEnd(_, eof) => *eof,
        }
    }

    pub fn trailer(&self) -> Option<&Header> {
        match &self.inner {
            BodyInner::Chunked(r) => r.trailer(),
            _ => None,
        }
    }

    /// Read and discard the rest of the body.
    pub async fn drain(&mut self) -> io::Result<u64> {
        let mut buf = [0u8; 4096];
        let mut total = 0u64;
        loop {
            let nr = self.read(&mut buf).await?;
            if nr == 0 {
                return Ok(total);
            }
            total += nr as u64;
        }
    }
}

impl<R> AsyncRead for HttpBodyReader<'_, R>
where
    R: AsyncBufRead + Unpin,
{
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match &mut self.inner {
            BodyInner::ContentLength(r) => Pin::new(r).poll_read(cx, buf),
            BodyInner::Chunked(r) => Pin::new(r).poll_read(cx, buf),
            BodyInner::UntilEnd(r, eof) => {
                if *eof {
                    return Poll::Ready(Ok(()));
                }
                let old_remaining = buf.remaining();
                ready!(Pin::new(&mut **r).poll_read(cx, buf))?;
                if old_remaining > 0 && buf.remaining() == old_remaining {
                    *eof = true;
                }
                Poll::Ready(Ok(()))
            }
        }
    }
}
