/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use tokio::io::AsyncBufRead;

pub struct LimitedReadUntil<'a, R: ?Sized> {
    reader: &'a mut R,
    delimiter: u8,
    max_len: usize,
    buf: &'a mut Vec<u8>,
    read: usize,
}

impl<'a, R: ?Sized> LimitedReadUntil<'a, R> {
    pub(super) fn new(reader: &'a mut R, delimiter: u8, max_len: usize, buf: &'a mut Vec<u8>) -> Self {
        LimitedReadUntil {
            reader,
            delimiter,
            max_len,
            buf,
            read: 0,
        }
    }
}

impl<R> Future for LimitedReadUntil<'_, R>
where
    R: AsyncBufRead + ?Sized + Unpin,
{
    type Output = io::Result<(bool, usize)>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let me = &mut *self;

        loop {
            let available = ready!(Pin::new(&mut *me.reader).poll_fill_buf(cx))?;
            if available.is_empty() {
                return Poll::Ready(Ok((false, me.read)));
            }

            let left = me.max_len - me.read;
            let search = &available[..available.len().min(left)];
            match memchr::memchr(me.delimiter, search) {
                Some(p) => {
                    me.buf.extend_from_slice(&search[..=p]);
                    Pin::new(&mut *me.reader).consume(p + 1);
                    me.read += p + 1;
                    return Poll::Ready(Ok((true, me.read)));
                }
                None => {
                    let len = search.len();
                    me.buf.extend_from_slice(search);
                    Pin::new(&mut *me.reader).consume(len);
                    me.read += len;
                    if me.read >= me.max_len {
                        return Poll::Ready(Ok((false, me.read)));
                    }
                }
            }
        }
    }
}
