/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll, ready};

use ahash::AHashMap;
use arcstr::ArcStr;
use tokio::io::{AsyncBufRead, AsyncRead, AsyncWrite, ReadBuf};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AccountBytes {
    pub read: u64,
    pub written: u64,
}

#[derive(Default)]
struct AccountingInner {
    total: AccountBytes,
    accounts: AHashMap<ArcStr, AccountBytes>,
}

#[derive(Debug, Default)]
pub struct ByteAccountingSnapshot {
    pub total: AccountBytes,
    pub accounts: Vec<(ArcStr, AccountBytes)>,
}

/// Process wide traffic counters.
///
/// The global total and the per account bucket are always updated together
/// under the same lock.
#[derive(Default)]
pub struct ByteAccounting {
    inner: Mutex<AccountingInner>,
}

impl ByteAccounting {
    pub fn new() -> Self {
        ByteAccounting::default()
    }

    pub fn add_read(&self, account: &ArcStr, size: u64) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.total.read += size;
        inner.accounts.entry(account.clone()).or_default().read += size;
    }

    pub fn add_written(&self, account: &ArcStr, size: u64) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.total.written += size;
        inner.accounts.entry(account.clone()).or_default().written += size;
    }

    pub fn total(&self) -> AccountBytes {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.total
    }

    pub fn account(&self, name: &str) -> Option<AccountBytes> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.accounts.get(name).copied()
    }

    pub fn snapshot(&self) -> ByteAccountingSnapshot {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let mut accounts: Vec<(ArcStr, AccountBytes)> = inner
            .accounts
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        accounts.sort_by(|a, b| a.0.cmp(&b.0));
        ByteAccountingSnapshot {
            total: inner.total,
            accounts,
        }
    }
}

pub struct CountingReader<R> {
    inner: R,
    accounting: Arc<ByteAccounting>,
    account: ArcStr,
    count: u64,
    finished: bool,
}

impl<R> CountingReader<R> {
    pub fn new(inner: R, accounting: Arc<ByteAccounting>, account: ArcStr) -> Self {
        CountingReader {
            inner,
            accounting,
            account,
            count: 0,
            finished: false,
        }
    }

    #[inline]
    pub fn count(&self) -> u64 {
        self.count
    }

    #[inline]
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    #[inline]
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Add the bytes of this stream to the shared counters, only the first call takes effect.
    pub fn finish(&mut self) {
        if !self.finished {
            self.finished = true;
            self.accounting.add_read(&self.account, self.count);
        }
    }
}

impl<R> Drop for CountingReader<R> {
    fn drop(&mut self) {
        self.finish();
    }
}

impl<R> AsyncRead for CountingReader<R>
where
    R: AsyncRead + Unpin,
{
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let old_filled = buf.filled().len();
        ready!(Pin::new(&mut self.inner).poll_read(cx, buf))?;
        let nr = buf.filled().len() - old_filled;
        self.count += nr as u64;
        Poll::Ready(Ok(()))
    }
}

impl<R> AsyncBufRead for CountingReader<R>
where
    R: AsyncBufRead + Unpin,
{
    fn poll_fill_buf(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<&[u8]>> {
        let me = self.get_mut();
        Pin::new(&mut me.inner).poll_fill_buf(cx)
    }

    fn consume(mut self: Pin<&mut Self>, amt: usize) {
        self.count += amt as u64;
        Pin::new(&mut self.inner).consume(amt);
    }
}

pub struct CountingWriter<W> {
    inner: W,
    accounting: Arc<ByteAccounting>,
    account: ArcStr,
    count: u64,
    finished: bool,
}

impl<W> CountingWriter<W> {
    pub fn new(inner: W, accounting: Arc<ByteAccounting>, account: ArcStr) -> Self {
        CountingWriter {
            inner,
            accounting,
            account,
            count: 0,
            finished: false,
        }
    }

    #[inline]
    pub fn count(&self) -> u64 {
        self.count
    }

    #[inline]
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    #[inline]
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    pub fn finish(&mut self) {
        if !self.finished {
            self.finished = true;
            self.accounting.add_written(&self.account, self.count);
        }
    }
}

impl<W> Drop for CountingWriter<W> {
    fn drop(&mut self) {
        self.finish();
    }
}

impl<W> AsyncWrite for CountingWriter<W>
where
    W: AsyncWrite + Unpin,
{
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let nw = ready!(Pin::new(&mut self.inner).poll_write(cx, buf))?;
        self.count += nw as u64;
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
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};

    #[tokio::test]
    async fn count_read() {
        let accounting = Arc::new(ByteAccounting::new());
        let account = arcstr::literal!("proxy");

        let stream = tokio_test::io::Builder::new().read(b"hello world").build();
        let mut reader = CountingReader::new(stream, accounting.clone(), account.clone());
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await.unwrap();
        assert_eq!(reader.count(), 11);
        assert_eq!(accounting.total().read, 0);

        reader.finish();
        reader.finish();
        drop(reader);
        assert_eq!(accounting.total().read, 11);
        assert_eq!(accounting.account("proxy").unwrap().read, 11);
    }

    #[tokio::test]
    async fn count_buf_read() {
        let accounting = Arc::new(ByteAccounting::new());
        let account = arcstr::literal!("server");

        let stream = tokio_test::io::Builder::new().read(b"line1\nline2\n").build();
        let mut reader = CountingReader::new(BufReader::new(stream), accounting.clone(), account);
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        assert_eq!(line, "line1\n");
        assert_eq!(reader.count(), 6);
        drop(reader);
        assert_eq!(accounting.account("server").unwrap().read, 6);
    }

    #[tokio::test]
    async fn count_write() {
        let accounting = Arc::new(ByteAccounting::new());
        let proxy = arcstr::literal!("proxy");
        let crawler = arcstr::literal!("crawler");

        let stream = tokio_test::io::Builder::new().write(b"abcd").build();
        let mut writer = CountingWriter::new(stream, accounting.clone(), proxy);
        writer.write_all(b"abcd").await.unwrap();
        drop(writer);

        let stream = tokio_test::io::Builder::new().write(b"xy").build();
        let mut writer = CountingWriter::new(stream, accounting.clone(), crawler);
        writer.write_all(b"xy").await.unwrap();
        writer.finish();

        let snapshot = accounting.snapshot();
        assert_eq!(snapshot.total.written, 6);
        assert_eq!(snapshot.accounts.len(), 2);
        assert_eq!(snapshot.accounts[0].0.as_str(), "crawler");
        assert_eq!(snapshot.accounts[0].1.written, 2);
        assert_eq!(snapshot.accounts[1].1.written, 4);
    }
}
