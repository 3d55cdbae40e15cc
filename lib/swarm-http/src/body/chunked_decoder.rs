/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use tokio::io::{AsyncBufRead, AsyncRead, ReadBuf};

use crate::HttpProtocolError;
use crate::header::Header;
use crate::parse::{HeaderBlockParser, HttpChunkedLine};

const MAX_TRAILER_SIZE: usize = 65536;

enum DecodeState {
    SizeLine,
    Data,
    DataEnd(usize),
    Trailer,
    Done,
}

struct ChunkedDecodeReaderInternal {
    body_line_max_size: usize,
    state: DecodeState,
    line_buf: Vec<u8>,
    left_chunk_size: u64,
    trailer_size: usize,
    trailer_parser: Option<HeaderBlockParser>,
    trailer: Option<Header>,
}

impl ChunkedDecodeReaderInternal {
    fn new(body_line_max_size: usize) -> Self {
        ChunkedDecodeReaderInternal {
            body_line_max_size,
            state: DecodeState::SizeLine,
            line_buf: Vec::with_capacity(32),
            left_chunk_size: 0,
            trailer_size: 0,
            trailer_parser: None,
            trailer: None,
        }
    }

    /// Poll a full line into `line_buf`, returns false if EOF is reached first.
    fn poll_line<R>(
        &mut self,
        cx: &mut Context<'_>,
        mut reader: Pin<&mut R>,
        max_size: usize,
    ) -> Poll<io::Result<bool>>
    where
        R: AsyncBufRead + Unpin,
    {
        loop {
            let r_buf = ready!(reader.as_mut().poll_fill_buf(cx))?;
            if r_buf.is_empty() {
                return Poll::Ready(Ok(false));
            }

            match memchr::memchr(b'\n', r_buf) {
                Some(p) => {
                    if self.line_buf.len() + p + 1 > max_size {
                        return Poll::Ready(Err(
                            HttpProtocolError::ChunkLineTooLong(max_size).into_io_error()
                        ));
                    }
                    self.line_buf.extend_from_slice(&r_buf[0..=p]);
                    reader.as_mut().consume(p + 1);
                    return Poll::Ready(Ok(true));
                }
                None => {
                    let len = r_buf.len();
                    if self.line_buf.len() + len > max_size {
                        return Poll::Ready(Err(
                            HttpProtocolError::ChunkLineTooLong(max_size).into_io_error()
                        ));
                    }
                    self.line_buf.extend_from_slice(r_buf);
                    reader.as_mut().consume(len);
                }
            }
        }
    }

    fn finish_trailer(&mut self) {
        self.trailer = self.trailer_parser.take().map(|p| p.finish());
        self.state = DecodeState::Done;
    }

    fn poll_decode<R>(
        &mut self,
        cx: &mut Context<'_>,
        mut reader: Pin<&mut R>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>>
    where
        R: AsyncBufRead + Unpin,
    {
        loop {
            match self.state {
                DecodeState::SizeLine => {
                    let max_size = self.body_line_max_size;
                    let found = ready!(self.poll_line(cx, reader.as_mut(), max_size))?;
                    if !found {
                        return Poll::Ready(Err(HttpProtocolError::UnexpectedEof(
                            "chunk size line",
                        )
                        .into_io_error()));
                    }
                    let chunk_line = HttpChunkedLine::parse(&self.line_buf)
                        .map_err(|e| HttpProtocolError::InvalidChunkSizeLine(e).into_io_error())?;
                    self.left_chunk_size = chunk_line.chunk_size;
                    self.line_buf.clear();
                    if self.left_chunk_size == 0 {
                        self.trailer_parser = Some(HeaderBlockParser::new(Header::new()));
                        self.state = DecodeState::Trailer;
                    } else {
                        self.state = DecodeState::Data;
                    }
                }
                DecodeState::Data => {
                    let buf_remaining = buf.remaining();
                    if buf_remaining == 0 {
                        return Poll::Ready(Ok(()));
                    }

                    let to_read = usize::try_from(self.left_chunk_size)
                        .unwrap_or(usize::MAX)
                        .min(buf_remaining);
                    let mut new_buf = ReadBuf::new(buf.initialize_unfilled_to(to_read));
                    ready!(reader.as_mut().poll_read(cx, &mut new_buf))?;
                    let nr = new_buf.filled().len();
                    if nr == 0 {
                        return Poll::Ready(Err(
                            HttpProtocolError::UnexpectedEof("chunk data").into_io_error()
                        ));
                    }
                    buf.advance(nr);
                    self.left_chunk_size -= nr as u64;
                    if self.left_chunk_size == 0 {
                        self.state = DecodeState::DataEnd(0);
                    }
                }
                DecodeState::DataEnd(offset) => {
                    let r_buf = ready!(reader.as_mut().poll_fill_buf(cx))?;
                    if r_buf.is_empty() {
                        return Poll::Ready(Err(
                            HttpProtocolError::UnexpectedEof("chunk data end").into_io_error()
                        ));
                    }
                    let expected = &b"\r\n"[offset..];
                    let len = expected.len().min(r_buf.len());
                    if r_buf[..len] != expected[..len] {
                        return Poll::Ready(Err(
                            HttpProtocolError::MissingChunkCrlf.into_io_error()
                        ));
                    }
                    reader.as_mut().consume(len);
                    if offset + len >= 2 {
                        self.state = DecodeState::SizeLine;
                    } else {
                        self.state = DecodeState::DataEnd(offset + len);
                    }
                }
                DecodeState::Trailer => {
                    let max_size = MAX_TRAILER_SIZE - self.trailer_size;
                    let found = ready!(self.poll_line(cx, reader.as_mut(), max_size))?;
                    self.trailer_size += self.line_buf.len();
                    let end = match self.trailer_parser.as_mut() {
                        Some(parser) => {
                            if !found && self.line_buf.is_empty() {
                                true
                            } else {
                                let end = parser
                                    .feed_line(&self.line_buf)
                                    .map_err(HttpProtocolError::into_io_error)?;
                                end || !found
                            }
                        }
                        None => true,
                    };
                    self.line_buf.clear();
                    if end {
                        self.finish_trailer();
                    }
                }
                DecodeState::Done => return Poll::Ready(Ok(())),
            }
        }
    }
}

/// Decode a chunked body from a buffered stream.
///
/// The trailer headers, if any, are available after EOF is returned.
pub struct ChunkedDecodeReader<'a, R> {
    reader: &'a mut R,
    internal: ChunkedDecodeReaderInternal,
}

impl<'a, R> ChunkedDecodeReader<'a, R> {
    pub fn new(reader: &'a mut R, body_line_max_size: usize) -> Self {
        ChunkedDecodeReader {
            reader,
            internal: ChunkedDecodeReaderInternal::new(body_line_max_size),
        }
    }

    pub fn finished(&self) -> bool {
        matches!(self.internal.state, DecodeState::Done)
    }

    pub fn trailer(&self) -> Option<&Header> {
        self.internal.trailer.as_ref().filter(|h| !h.is_empty())
    }

    pub fn into_reader(self) -> &'a mut R {
        self.reader
    }
}

impl<R> AsyncRead for ChunkedDecodeReader<'_, R>
where
    R: AsyncBufRead + Unpin,
{
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let me = &mut *self;

        let old_remaining = buf.remaining();
        match me.internal.poll_decode(cx, Pin::new(&mut *me.reader), buf) {
            Poll::Pending => {
                if old_remaining > buf.remaining() {
                    Poll::Ready(Ok(()))
                } else {
                    Poll::Pending
                }
            }
            Poll::Ready(r) => Poll::Ready(r),
        }
    }
}
