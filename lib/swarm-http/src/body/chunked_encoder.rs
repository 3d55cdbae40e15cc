/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::io::{self, Write};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::header::Header;

/// Write a body with the chunked transfer coding.
pub struct ChunkedEncodeWriter<W> {
    writer: W,
    header_buf: Vec<u8>,
    total_write: u64,
    finished: bool,
}

impl<W> ChunkedEncodeWriter<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(writer: W) -> Self {
        ChunkedEncodeWriter {
            writer,
            header_buf: Vec::with_capacity(16),
            total_write: 0,
            finished: false,
        }
    }

    /// Body bytes written, excluding the chunk framing.
    pub fn total_write(&self) -> u64 {
        self.total_write
    }

    pub fn finished(&self) -> bool {
        self.finished
    }

    fn check_not_finished(&self) -> io::Result<()> {
        if self.finished {
            Err(io::Error::other("chunked body has already been finished"))
        } else {
            Ok(())
        }
    }

    /// Write one chunk and flush, empty data is ignored.
    pub async fn write_chunk(&mut self, data: &[u8]) -> io::Result<()> {
        self.check_not_finished()?;
        if data.is_empty() {
            return Ok(());
        }

        self.header_buf.clear();
        let _ = write!(&mut self.header_buf, "{:x}\r\n", data.len());
        self.writer.write_all(&self.header_buf).await?;
        self.writer.write_all(data).await?;
        self.writer.write_all(b"\r\n").await?;
        self.writer.flush().await?;
        self.total_write += data.len() as u64;
        Ok(())
    }

    /// Write the last chunk, only the first call takes effect.
    pub async fn finish(&mut self) -> io::Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.writer.write_all(b"0\r\n\r\n").await?;
        self.writer.flush().await
    }

    pub async fn finish_with_trailer(&mut self, trailer: &Header) -> io::Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        let mut buf = Vec::with_capacity(64);
        buf.extend_from_slice(b"0\r\n");
        trailer.serialize_to("", &mut buf);
        self.writer.write_all(&buf).await?;
        self.writer.flush().await
    }

    /// Copy all data from `reader` as chunks, the body is not finished.
    pub async fn copy_from<R>(&mut self, reader: &mut R, buf_size: usize) -> io::Result<u64>
    where
        R: AsyncRead + Unpin,
    {
        let mut buf = vec![0u8; buf_size.max(512)];
        let mut copied = 0u64;
        loop {
            let nr = reader.read(&mut buf).await?;
            if nr == 0 {
                return Ok(copied);
            }
            self.write_chunk(&buf[..nr]).await?;
            copied += nr as u64;
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::ChunkedDecodeReader;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn write_simple() {
        let mut encoder = ChunkedEncodeWriter::new(Vec::new());
        encoder.write_chunk(b"test").await.unwrap();
        encoder.write_chunk(b"").await.unwrap();
        encoder.finish().await.unwrap();
        encoder.finish().await.unwrap();
        assert!(encoder.write_chunk(b"more").await.is_err());
        assert_eq!(encoder.total_write(), 4);
        assert_eq!(encoder.into_inner().as_slice(), b"4\r\ntest\r\n0\r\n\r\n");
    }

    #[tokio::test]
    async fn write_empty_body() {
        let mut encoder = ChunkedEncodeWriter::new(Vec::new());
        encoder.finish().await.unwrap();
        assert_eq!(encoder.into_inner().as_slice(), b"0\r\n\r\n");
    }

    #[tokio::test]
    async fn write_trailer() {
        let mut trailer = Header::new();
        trailer.add("X-Check", "1");
        let mut encoder = ChunkedEncodeWriter::new(Vec::new());
        encoder.write_chunk(b"abc").await.unwrap();
        encoder.finish_with_trailer(&trailer).await.unwrap();
        assert_eq!(
            encoder.into_inner().as_slice(),
            b"3\r\nabc\r\n0\r\nX-Check: 1\r\n\r\n"
        );
    }

    #[tokio::test]
    async fn round_trip() {
        for size in [1usize, 70000] {
            let data = (0..size).map(|i| (i % 251) as u8).collect::<Vec<u8>>();
            let mut encoder = ChunkedEncodeWriter::new(Vec::new());
            let mut reader = data.as_slice();
            let copied = encoder.copy_from(&mut reader, 16384).await.unwrap();
            assert_eq!(copied, size as u64);
            encoder.finish().await.unwrap();
            let encoded = encoder.into_inner();

            let mut buf_stream = BufReader::new(encoded.as_slice());
            let mut decoder = ChunkedDecodeReader::new(&mut buf_stream, 1024);
            let mut decoded = Vec::new();
            decoder.read_to_end(&mut decoded).await.unwrap();
            assert_eq!(decoded, data);
        }
    }

    #[tokio::test]
    async fn round_trip_buffers() {
        let large = (0..70000).map(|i| (i % 251) as u8).collect::<Vec<u8>>();
        let buffers: [&[u8]; 5] = [b"", b"a", &large, b"", b"z"];

        let mut encoder = ChunkedEncodeWriter::new(Vec::new());
        for buf in buffers {
            encoder.write_chunk(buf).await.unwrap();
        }
        encoder.finish().await.unwrap();
        let encoded = encoder.into_inner();

        let mut buf_stream = BufReader::new(encoded.as_slice());
        let mut decoder = ChunkedDecodeReader::new(&mut buf_stream, 1024);
        let mut decoded = Vec::new();
        decoder.read_to_end(&mut decoded).await.unwrap();
        assert_eq!(decoded, buffers.concat());
    }
}
