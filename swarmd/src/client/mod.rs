/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::sync::Arc;
use std::time::Duration;

use arcstr::ArcStr;
use bytes::Bytes;
use http::{Method, StatusCode};
use log::debug;
use tokio::io::{AsyncBufRead, AsyncRead, AsyncWrite, AsyncWriteExt};
use url::Url;

use swarm_http::body::{HttpBodyReader, HttpBodyType};
use swarm_http::header::{Header, ResponseHeader};
use swarm_http::{HttpLineParseError, HttpProtocolError, HttpStatusLine, HttpVersion};
use swarm_io_ext::{ByteAccounting, CountingReader, CountingWriter, LimitedBufReadExt, SizeLimitedWriter};

use crate::pool::{ConnectionPool, PooledConnection};
use crate::upstream::UpstreamAddr;

mod error;
pub use error::HttpClientError;

#[derive(Clone, Debug)]
pub struct HttpClientConfig {
    pub rsp_hdr_max_size: usize,
    pub read_timeout: Duration,
    pub body_line_max_len: usize,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        HttpClientConfig {
            rsp_hdr_max_size: 65536, // 64KiB
            read_timeout: Duration::from_secs(60),
            body_line_max_len: 8192,
        }
    }
}

pub struct HttpClientResponse {
    pub version: HttpVersion,
    pub status: StatusCode,
    pub reason: String,
    pub header: ResponseHeader,
    pub body_type: Option<HttpBodyType>,
    /// Whether the connection may be reused after the body.
    pub keep_alive: bool,
}

impl HttpClientResponse {
    pub fn status_line(&self) -> String {
        format!("{} {:03} {}", self.version, self.status.as_u16(), self.reason)
    }
}

pub struct HttpFetchRequest {
    pub method: Method,
    pub url: Url,
    pub header: Header,
    pub body: Option<Bytes>,
    pub max_body_size: u64,
}

impl HttpFetchRequest {
    pub fn get(url: Url, max_body_size: u64) -> Self {
        HttpFetchRequest {
            method: Method::GET,
            url,
            header: Header::new(),
            body: None,
            max_body_size,
        }
    }
}

pub struct HttpFetchResponse {
    pub status: StatusCode,
    pub header: ResponseHeader,
    pub body: Bytes,
}

/// Outbound HTTP/1.1 client over the shared connection pool.
#[derive(Clone)]
pub struct HttpClient {
    pool: Arc<ConnectionPool>,
    accounting: Arc<ByteAccounting>,
    account: ArcStr,
    config: HttpClientConfig,
}

impl HttpClient {
    pub fn new(
        pool: Arc<ConnectionPool>,
        accounting: Arc<ByteAccounting>,
        account: &str,
        config: HttpClientConfig,
    ) -> Self {
        HttpClient {
            pool,
            accounting,
            account: ArcStr::from(account),
            config,
        }
    }

    /// A client sharing the same pool but counting bytes to another account.
    pub fn with_account(&self, account: &str) -> Self {
        HttpClient {
            account: ArcStr::from(account),
            ..self.clone()
        }
    }

    #[inline]
    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    #[inline]
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    pub fn count_reader<R: AsyncRead>(&self, reader: R) -> CountingReader<R> {
        CountingReader::new(reader, Arc::clone(&self.accounting), self.account.clone())
    }

    pub fn count_writer<W: AsyncWrite>(&self, writer: W) -> CountingWriter<W> {
        CountingWriter::new(writer, Arc::clone(&self.accounting), self.account.clone())
    }

    pub async fn connect(&self, upstream: &UpstreamAddr) -> Result<PooledConnection, HttpClientError> {
        let conn = self.pool.borrow(upstream).await?;
        Ok(conn)
    }

    /// Give the connection back, it is kept only if `reusable` and clean.
    pub fn finish(&self, mut conn: PooledConnection, reusable: bool) {
        conn.set_reusable(reusable);
        self.pool.release(conn);
    }

    pub async fn send_head(
        &self,
        conn: &mut PooledConnection,
        head: &[u8],
    ) -> Result<(), HttpClientError> {
        let mut writer = self.count_writer(conn.writer());
        writer
            .write_all(head)
            .await
            .map_err(HttpClientError::WriteFailed)?;
        writer.flush().await.map_err(HttpClientError::WriteFailed)
    }

    /// Read the status line and header of the next final response.
    pub async fn recv_response(
        &self,
        conn: &mut PooledConnection,
        method_is_head: bool,
    ) -> Result<HttpClientResponse, HttpClientError> {
        let mut reader = self.count_reader(conn.reader());
        tokio::time::timeout(
            self.config.read_timeout,
            read_response(&mut reader, self.config.rsp_hdr_max_size, method_is_head),
        )
        .await
        .map_err(|_| HttpClientError::ReadTimeout)?
    }

    /// Send a request and collect the whole response body.
    pub async fn fetch(&self, req: &HttpFetchRequest) -> Result<HttpFetchResponse, HttpClientError> {
        if req.url.scheme() != "http" {
            return Err(HttpClientError::UnsupportedUrl(req.url.to_string()));
        }
        let Some(host) = req.url.host_str() else {
            return Err(HttpClientError::UnsupportedUrl(req.url.to_string()));
        };
        let host = host.trim_start_matches('[').trim_end_matches(']');
        let upstream = UpstreamAddr::new(host, req.url.port_or_known_default().unwrap_or(80));

        let mut target = req.url.path().to_string();
        if let Some(query) = req.url.query() {
            target.push('?');
            target.push_str(query);
        }
        let mut header = req.header.clone();
        if !header.contains(http::header::HOST.as_str()) {
            header.put("Host", upstream.host_header_value(80));
        }
        match &req.body {
            Some(body) => header.set_content_length(body.len() as u64),
            None => {
                header.remove(http::header::CONTENT_LENGTH.as_str());
            }
        }
        header.remove(http::header::TRANSFER_ENCODING.as_str());
        let head = header.serialize(&format!("{} {target} HTTP/1.1", req.method));

        let mut conn = self.connect(&upstream).await?;
        match self.exchange(&mut conn, &head, req).await {
            Ok(rsp) => {
                self.pool.release(conn);
                Ok(rsp)
            }
            Err(e) if conn.is_reused() && retryable(&e) => {
                debug!("retry {} on a new connection after {e}", req.url);
                self.pool.invalidate(conn);
                let mut conn = self.connect(&upstream).await?;
                let r = self.exchange(&mut conn, &head, req).await;
                self.pool.release(conn);
                r
            }
            Err(e) => {
                self.pool.invalidate(conn);
                Err(e)
            }
        }
    }

    async fn exchange(
        &self,
        conn: &mut PooledConnection,
        head: &[u8],
        req: &HttpFetchRequest,
    ) -> Result<HttpFetchResponse, HttpClientError> {
        conn.set_reusable(false);
        self.send_head(conn, head).await?;
        if let Some(body) = &req.body {
            let mut writer = self.count_writer(conn.writer());
            writer
                .write_all(body)
                .await
                .map_err(HttpClientError::WriteFailed)?;
            writer.flush().await.map_err(HttpClientError::WriteFailed)?;
        }

        let rsp = self.recv_response(conn, req.method == Method::HEAD).await?;
        let mut body = SizeLimitedWriter::new(Vec::new(), req.max_body_size);
        let mut reusable = rsp.keep_alive;
        if let Some(body_type) = rsp.body_type {
            let mut reader = self.count_reader(conn.reader());
            let mut body_reader =
                HttpBodyReader::new(&mut reader, body_type, self.config.body_line_max_len);
            tokio::time::timeout(
                self.config.read_timeout,
                tokio::io::copy(&mut body_reader, &mut body),
            )
            .await
            .map_err(|_| HttpClientError::ReadTimeout)?
            .map_err(HttpClientError::from_body_read)?;
            reusable &= body_reader.finished();
        }
        conn.set_reusable(reusable);

        Ok(HttpFetchResponse {
            status: rsp.status,
            header: rsp.header,
            body: Bytes::from(body.into_inner()),
        })
    }
}

fn retryable(e: &HttpClientError) -> bool {
    matches!(
        e,
        HttpClientError::ClosedByRemote | HttpClientError::WriteFailed(_)
    )
}

/// Read a response head, skipping interim 1xx responses.
pub(crate) async fn read_response<R>(
    reader: &mut R,
    max_size: usize,
    method_is_head: bool,
) -> Result<HttpClientResponse, HttpClientError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::<u8>::with_capacity(128);
    loop {
        line.clear();
        let (found, nr) = reader
            .limited_read_until(b'\n', max_size, &mut line)
            .await
            .map_err(HttpClientError::ReadFailed)?;
        if nr == 0 {
            return Err(HttpClientError::ClosedByRemote);
        }
        if !found {
            return if nr >= max_size {
                Err(HttpClientError::InvalidResponse(
                    HttpProtocolError::TooLargeHeader(max_size),
                ))
            } else {
                Err(HttpClientError::ClosedByRemote)
            };
        }

        let status_line = HttpStatusLine::parse(&line)
            .map_err(|e| HttpClientError::InvalidResponse(HttpProtocolError::InvalidStatusLine(e)))?;
        let version = status_line.version;
        let reason = status_line.reason.to_string();
        let status = StatusCode::from_u16(status_line.code).map_err(|_| {
            HttpClientError::InvalidResponse(HttpProtocolError::InvalidStatusLine(
                HttpLineParseError::InvalidStatusCode,
            ))
        })?;

        let header =
            swarm_http::read_header_block(reader, max_size - nr, Header::new()).await?;
        if status.is_informational() {
            continue;
        }

        let body_type = HttpBodyType::detect_response(&header, method_is_head, status)
            .map_err(HttpClientError::InvalidResponse)?;
        let mut keep_alive = match version {
            HttpVersion::Http11 => !header.connection_close(),
            HttpVersion::Http10 => header
                .get(http::header::CONNECTION.as_str())
                .map(|v| v.to_ascii_lowercase().contains("keep-alive"))
                .unwrap_or(false),
            HttpVersion::Http09 => false,
        };
        if body_type == Some(HttpBodyType::ReadUntilEnd) {
            keep_alive = false;
        }

        return Ok(HttpClientResponse {
            version,
            status,
            reason,
            header: ResponseHeader::from(header),
            body_type,
            keep_alive,
        });
    }
}
