/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};

use crate::HttpProtocolError;

/// Read at most `content_length` bytes, then return EOF.
pub struct ContentLengthReader<'a, R> {
    reader: &'a mut R,
    left: u64,
    closed: bool,
}

impl<'a, R> ContentLengthReader<'a, R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(reader: &'a mut R, content_length: u64) -> Self {
        ContentLengthReader {
            reader,
            left: content_length,
            closed: false,
        }
    }

    #[inline]
    pub fn remaining(&self) -> u64 {
        self.left
    }

    #[inline]
    pub fn finished(&self) -> bool {
        self.left == 0
    }

    /// Skip the unread bytes of the body, the inner stream is left open.
    pub async fn close(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        let mut buf = [0u8; 4096];
        while self.left > 0 {
            self.read(&mut buf).await?;
        }
        self.closed = true;
        Ok(())
    }

    pub fn into_reader(self) -> &'a mut R {
        self.reader
    }
}

impl<R> AsyncRead for ContentLengthReader<'_, R>
where
    R: AsyncRead + Unpin,
{
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let me = &mut *self;
        if me.left == 0 || buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }

        let to_read = usize::try_from(me.left)
            .unwrap_or(usize::MAX)
            .min(buf.remaining());
        let mut new_buf = ReadBuf::new(buf.initialize_unfilled_to(to_read));
        ready!(Pin::new(&mut *me.reader).poll_read(cx, &mut new_buf))?;
        let nr = new_buf.filled().len();
        if nr == 0 {
            return Poll::Ready(Err(
                HttpProtocolError::UnexpectedEof("content-length body").into_io_error()
            ));
        }
        buf.advance(nr);
        me.left -= nr as u64;
        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn read_exact_length() {
        let mut stream = tokio_test::io::Builder::new()
            .read(b"0123")
            .read(b"456789next")
            .build();
        let mut reader = ContentLengthReader::new(&mut stream, 10);

        let mut buf = Vec::new();
        let len = reader.read_to_end(&mut buf).await.unwrap();
        assert_eq!(len, 10);
        assert_eq!(buf.as_slice(), b"0123456789");
        assert!(reader.finished());

        let stream = reader.into_reader();
        let mut left = Vec::new();
        stream.read_to_end(&mut left).await.unwrap();
        assert_eq!(left.as_slice(), b"next");
    }

    #[tokio::test]
    async fn premature_eof() {
        let mut stream = tokio_test::io::Builder::new().read(b"0123").build();
        let mut reader = ContentLengthReader::new(&mut stream, 10);

        let mut buf = Vec::new();
        let e = reader.read_to_end(&mut buf).await.unwrap_err();
        assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn close_drain() {
        let mut stream = tokio_test::io::Builder::new()
            .read(b"abcdefGET")
            .build();
        let mut reader = ContentLengthReader::new(&mut stream, 6);

        let mut buf = [0u8; 2];
        reader.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ab");
        assert_eq!(reader.remaining(), 4);

        reader.close().await.unwrap();
        reader.close().await.unwrap();
        assert_eq!(reader.remaining(), 0);

        let stream = reader.into_reader();
        let mut left = Vec::new();
        stream.read_to_end(&mut left).await.unwrap();
        assert_eq!(left.as_slice(), b"GET");
    }
}
