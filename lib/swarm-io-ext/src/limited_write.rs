/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use thiserror::Error;
use tokio::io::AsyncWrite;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("size limit {limit} exceeded")]
pub struct SizeLimitExceeded {
    pub limit: u64,
}

impl SizeLimitExceeded {
    pub fn from_io_error(e: &io::Error) -> Option<&SizeLimitExceeded> {
        e.get_ref()
            .and_then(|inner| inner.downcast_ref::<SizeLimitExceeded>())
    }
}

/// A writer that passes through at most `limit` bytes.
///
/// The write that crosses the limit is cut at the limit, the next one fails
/// with [`SizeLimitExceeded`] inside the returned io error.
pub struct SizeLimitedWriter<W> {
    inner: W,
    limit: u64,
    written: u64,
}

impl<W> SizeLimitedWriter<W> {
    pub fn new(inner: W, limit: u64) -> Self {
        SizeLimitedWriter {
            inner,
            limit,
            written: 0,
        }
    }

    #[inline]
    pub fn written(&self) -> u64 {
        self.written
    }

    #[inline]
    pub fn limit(&self) -> u64 {
        self.limit
    }

    #[inline]
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W> AsyncWrite for SizeLimitedWriter<W>
where
    W: AsyncWrite + Unpin,
{
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if buf.is_empty() {
            return Poll::Ready(Ok(0));
        }

        let left = self.limit - self.written;
        if left == 0 {
            return Poll::Ready(Err(io::Error::other(SizeLimitExceeded {
                limit: self.limit,
            })));
        }

        let to_write = usize::try_from(left).unwrap_or(usize::MAX).min(buf.len());
        let nw = ready!(Pin::new(&mut self.inner).poll_write(cx, &buf[..to_write]))?;
        self.written += nw as u64;
        Poll::Ready(Ok(nw))
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn within_limit() {
        let mut writer = SizeLimitedWriter::new(Vec::new(), 8);
        writer.write_all(b"12345678").await.unwrap();
        assert_eq!(writer.written(), 8);
        assert_eq!(writer.into_inner(), b"12345678");
    }

    #[tokio::test]
    async fn exceed_limit() {
        let mut writer = SizeLimitedWriter::new(Vec::new(), 4);
        let e = writer.write_all(b"123456").await.unwrap_err();
        let limit_e = SizeLimitExceeded::from_io_error(&e).unwrap();
        assert_eq!(limit_e.limit, 4);
        assert_eq!(writer.written(), 4);
        assert_eq!(writer.get_ref().as_slice(), b"1234");
    }

    #[tokio::test]
    async fn exceed_after_full() {
        let mut writer = SizeLimitedWriter::new(Vec::new(), 2);
        writer.write_all(b"ab").await.unwrap();
        let e = writer.write_all(b"c").await.unwrap_err();
        assert!(SizeLimitExceeded::from_io_error(&e).is_some());

        let e = io::Error::other("other");
        assert!(SizeLimitExceeded::from_io_error(&e).is_none());
    }
}
