/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use async_trait::async_trait;
use bytes::Bytes;
use http::{Method, StatusCode};
use tokio::io::{AsyncBufRead, AsyncWrite};

use swarm_http::HttpVersion;
use swarm_http::body::{HttpBodyReader, HttpBodyType};
use swarm_http::header::{Header, RequestHeader};
use swarm_io_ext::{SizeLimitExceeded, SizeLimitedWriter};

use super::connection::RequestOutcome;
use super::request::HttpRequest;
use super::response::{ResponseHead, write_full_response};
use super::{ServerTaskError, ServerTaskResult};
use crate::auth::check_server_auth;
use crate::context::ServerContext;

/// A request addressed to this server itself.
pub struct OriginRequest<'a> {
    pub method: &'a Method,
    pub path: &'a str,
    pub query: Option<&'a str>,
    pub version: HttpVersion,
    /// Carries the peer address as the client address property.
    pub header: &'a RequestHeader,
    pub body: Bytes,
}

pub struct OriginResponse {
    pub status: StatusCode,
    pub header: Header,
    pub body: Bytes,
}

impl OriginResponse {
    pub fn new(status: StatusCode, content_type: &str, body: Bytes) -> Self {
        let mut header = Header::new();
        header.put("Content-Type", content_type);
        OriginResponse {
            status,
            header,
            body,
        }
    }
}

/// Serve the pages of this node, files and servlets live behind it.
#[async_trait]
pub trait OriginHandler: Send + Sync {
    async fn handle(&self, req: OriginRequest<'_>) -> OriginResponse;
}

pub struct NotFoundHandler;

#[async_trait]
impl OriginHandler for NotFoundHandler {
    async fn handle(&self, req: OriginRequest<'_>) -> OriginResponse {
        let body = format!(
            "<html><head><title>404 Not Found</title></head><body><h1>Not Found</h1><p>{}</p></body></html>\r\n",
            html_escape(req.path)
        );
        OriginResponse::new(
            StatusCode::NOT_FOUND,
            "text/html; charset=utf-8",
            Bytes::from(body),
        )
    }
}

pub(super) async fn serve_origin<R, W>(
    ctx: &ServerContext,
    req: &HttpRequest,
    outcome: &mut RequestOutcome,
    clt_r: &mut R,
    clt_w: &mut W,
) -> ServerTaskResult<()>
where
    R: AsyncBufRead + Send + Unpin,
    W: AsyncWrite + Send + Unpin,
{
    let config = ctx.server_config();
    if let Some(auth) = &config.auth
        && auth.protects(&req.path)
        && !check_server_auth(auth, req.header.header())
    {
        return Err(ServerTaskError::ClientAuthFailed);
    }

    let body = match req.body_type {
        Some(body_type) => read_body(ctx, body_type, clt_r).await?,
        None => Bytes::new(),
    };

    let rsp = ctx
        .origin()
        .handle(OriginRequest {
            method: &req.method,
            path: &req.path,
            query: req.query.as_deref(),
            version: req.version,
            header: &req.header,
            body,
        })
        .await;

    outcome.status = Some(rsp.status.as_u16());
    outcome.head_sent = true;
    let head = ResponseHead::new(req.version, rsp.status, rsp.header, outcome.keep_alive);
    write_full_response(
        clt_w,
        head,
        &rsp.body,
        req.method == Method::HEAD,
        &config.name,
    )
    .await
    .map_err(ServerTaskError::ClientTcpWriteFailed)
}

async fn read_body<R>(ctx: &ServerContext, body_type: HttpBodyType, clt_r: &mut R) -> ServerTaskResult<Bytes>
where
    R: AsyncBufRead + Send + Unpin,
{
    let config = ctx.server_config();
    let mut body_reader = HttpBodyReader::new(clt_r, body_type, config.body_line_max_len);
    let mut buf = SizeLimitedWriter::new(Vec::new(), config.origin_body_max_size as u64);
    match tokio::time::timeout(
        config.read_timeout,
        tokio::io::copy(&mut body_reader, &mut buf),
    )
    .await
    {
        Ok(Ok(_)) => Ok(Bytes::from(buf.into_inner())),
        Ok(Err(e)) => match SizeLimitExceeded::from_io_error(&e) {
            Some(limit) => Err(ServerTaskError::ClientBodyTooLarge(limit.limit)),
            None => Err(ServerTaskError::from_client_body_read(e)),
        },
        Err(_) => Err(ServerTaskError::ClientAppTimeout("read request body")),
    }
}

pub(crate) fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
