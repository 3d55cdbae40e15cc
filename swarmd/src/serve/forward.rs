/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::{Method, StatusCode};
use log::debug;
use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;
use url::Url;

use swarm_http::HttpVersion;
use swarm_http::body::{HttpBodyReader, HttpBodyType};
use swarm_http::header::{Header, RequestHeader, ResponseHeader};

use super::connection::RequestOutcome;
use super::notes::ServerTaskNotes;
use super::request::HttpRequest;
use super::response::{
    BodyCopyError, BodyTee, ResponseFraming, ResponseHead, copy_body, strip_hop_by_hop,
    write_full_response,
};
use super::{ServerTaskError, ServerTaskResult};
use crate::auth::{AuthDenied, PEER_HOP_HEADER, PEER_KEY_HEADER, ProxyAccess};
use crate::cache::{CacheEntry, StoreDenyReason, not_modified_header};
use crate::client::HttpClient;
use crate::context::ServerContext;
use crate::pool::PooledConnection;
use crate::upstream::UpstreamAddr;

pub(super) fn check_access(
    ctx: &ServerContext,
    header: &Header,
    upstream: &UpstreamAddr,
) -> ServerTaskResult<ProxyAccess> {
    ctx.proxy_auth()
        .check(header, upstream, Instant::now())
        .map_err(|e| match e {
            AuthDenied::Unauthorized => ServerTaskError::ProxyAuthRequired,
            AuthDenied::Forbidden(f) => ServerTaskError::ForbiddenByRule(f),
        })
}

/// Append this node to the Via chain.
fn add_via(header: &mut Header, version: HttpVersion, server_name: &str) {
    let proto = match version {
        HttpVersion::Http11 => "1.1",
        _ => "1.0",
    };
    let value = match header.get("Via") {
        Some(v) if !v.trim().is_empty() => format!("{}, {proto} {server_name}", v.trim()),
        _ => format!("{proto} {server_name}"),
    };
    header.put("Via", value);
}

pub(super) async fn serve_forward<R, W>(
    ctx: &ServerContext,
    req: &HttpRequest,
    notes: &mut ServerTaskNotes,
    outcome: &mut RequestOutcome,
    clt_r: &mut R,
    clt_w: &mut W,
) -> ServerTaskResult<()>
where
    R: AsyncBufRead + Send + Unpin,
    W: AsyncWrite + Send + Unpin,
{
    let Some(upstream) = &req.upstream else {
        return Err(swarm_http::HttpProtocolError::MissingHostHeader.into());
    };
    outcome.upstream = Some(upstream.to_string());

    let access = check_access(ctx, req.header.header(), upstream)?;
    notes.user = access.user_name();

    let r = forward(ctx, req, upstream, notes, outcome, clt_r, clt_w).await;
    ctx.proxy_auth().add_usage(&access, notes.time_elapsed());
    r
}

async fn forward<R, W>(
    ctx: &ServerContext,
    req: &HttpRequest,
    upstream: &UpstreamAddr,
    notes: &ServerTaskNotes,
    outcome: &mut RequestOutcome,
    clt_r: &mut R,
    clt_w: &mut W,
) -> ServerTaskResult<()>
where
    R: AsyncBufRead + Send + Unpin,
    W: AsyncWrite + Send + Unpin,
{
    let now = Utc::now();
    let url = if req.method == Method::GET || req.method == Method::HEAD {
        req.url()
    } else {
        None
    };
    let prior = url.as_ref().and_then(|url| ctx.cache().prior(url));

    if let Some(url) = &url
        && let Some(entry) = ctx.cache().usable(&req.method, url, prior.as_ref(), now)
    {
        return reply_from_cache(ctx, req, &entry, now, outcome, clt_r, clt_w).await;
    }

    let client = ctx.proxy_client();
    let mut conn = client.connect(upstream).await?;
    let exchange = Exchange {
        ctx,
        client,
        req,
        upstream,
        notes,
        cache_url: url.filter(|_| req.method == Method::GET),
        prior: prior.as_deref(),
    };
    match exchange.run(&mut conn, outcome, clt_r, clt_w).await {
        Ok(reusable) => {
            client.finish(conn, reusable);
            Ok(())
        }
        Err(e) => {
            client.pool().invalidate(conn);
            Err(e)
        }
    }
}

async fn reply_from_cache<R, W>(
    ctx: &ServerContext,
    req: &HttpRequest,
    entry: &Arc<CacheEntry>,
    now: DateTime<Utc>,
    outcome: &mut RequestOutcome,
    clt_r: &mut R,
    clt_w: &mut W,
) -> ServerTaskResult<()>
where
    R: AsyncBufRead + Send + Unpin,
    W: AsyncWrite + Send + Unpin,
{
    let config = ctx.server_config();
    if let Some(body_type) = req.body_type {
        let mut body_reader = HttpBodyReader::new(clt_r, body_type, config.body_line_max_len);
        match tokio::time::timeout(config.read_timeout, body_reader.drain()).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(ServerTaskError::from_client_body_read(e)),
            Err(_) => return Err(ServerTaskError::ClientAppTimeout("read request body")),
        }
    }

    let ims = req.header.if_modified_since();
    if let Some(header) = not_modified_header(entry, ims.as_ref(), now) {
        debug!("{} not modified since {:?}", entry.url, ims);
        outcome.cache = Some("NOT_MODIFIED");
        outcome.status = Some(StatusCode::NOT_MODIFIED.as_u16());
        outcome.head_sent = true;
        let head = ResponseHead::new(
            req.version,
            StatusCode::NOT_MODIFIED,
            header.into_header(),
            outcome.keep_alive,
        );
        return write_full_response(clt_w, head, &[], true, &config.name)
            .await
            .map_err(ServerTaskError::ClientTcpWriteFailed);
    }

    let mut header = entry.header.header().clone();
    header.set_content_length(entry.size());
    add_via(&mut header, HttpVersion::Http11, &config.name);
    let reason = entry.status_line.splitn(3, ' ').nth(2).unwrap_or_default();
    let head = ResponseHead::with_reason(
        req.version,
        entry.status,
        reason,
        header,
        outcome.keep_alive,
    );
    outcome.cache = Some("HIT");
    outcome.status = Some(entry.status.as_u16());
    outcome.head_sent = true;
    write_full_response(
        clt_w,
        head,
        &entry.body,
        req.method == Method::HEAD,
        &config.name,
    )
    .await
    .map_err(ServerTaskError::ClientTcpWriteFailed)
}

/// One request and response over a pooled upstream connection.
struct Exchange<'a> {
    ctx: &'a ServerContext,
    client: &'a HttpClient,
    req: &'a HttpRequest,
    upstream: &'a UpstreamAddr,
    notes: &'a ServerTaskNotes,
    cache_url: Option<Url>,
    prior: Option<&'a CacheEntry>,
}

impl Exchange<'_> {
    fn build_head(&self) -> Vec<u8> {
        let req = self.req;
        let mut header = req.header.header().clone();
        strip_hop_by_hop(&mut header);
        header.remove(PEER_HOP_HEADER);
        header.remove(PEER_KEY_HEADER);

        let mut header = RequestHeader::from(header);
        header.append_forwarded_for(&self.notes.client_addr.ip().to_string());
        let mut header = header.into_header();
        add_via(&mut header, req.version, &self.ctx.server_config().name);
        header.put("Host", self.upstream.host_header_value(80));

        match req.body_type {
            Some(HttpBodyType::ContentLength(n)) => header.set_content_length(n),
            Some(HttpBodyType::Chunked | HttpBodyType::ReadUntilEnd) => {
                header.remove(http::header::CONTENT_LENGTH.as_str());
                header.put("Transfer-Encoding", "chunked");
            }
            None => {}
        }
        // always keep the upstream connection open, the pool decides
        header.serialize(&format!(
            "{} {} HTTP/1.1",
            req.method,
            req.origin_form_target()
        ))
    }

    /// Returns whether the upstream connection may be reused.
    async fn run<R, W>(
        self,
        conn: &mut PooledConnection,
        outcome: &mut RequestOutcome,
        clt_r: &mut R,
        clt_w: &mut W,
    ) -> ServerTaskResult<bool>
    where
        R: AsyncBufRead + Send + Unpin,
        W: AsyncWrite + Send + Unpin,
    {
        let config = self.ctx.server_config();
        let req = self.req;
        let client = self.client;

        let head = self.build_head();
        client.send_head(conn, &head).await?;
        if let Some(body_type) = req.body_type {
            let mut body_reader = HttpBodyReader::new(clt_r, body_type, config.body_line_max_len);
            let mut ups_w = client.count_writer(conn.writer());
            copy_body(
                &mut body_reader,
                &mut ups_w,
                !matches!(body_type, HttpBodyType::ContentLength(_)),
                None,
                config.read_timeout,
            )
            .await
            .map_err(|e| match e {
                BodyCopyError::ReadFailed(e) => ServerTaskError::from_client_body_read(e),
                BodyCopyError::ReadTimeout => ServerTaskError::ClientAppTimeout("read request body"),
                BodyCopyError::WriteFailed(e) => ServerTaskError::UpstreamWriteFailed(e),
            })?;
        }

        let rsp = client
            .recv_response(conn, req.method == Method::HEAD)
            .await?;
        outcome.status = Some(rsp.status.as_u16());

        let mut rsp_header = rsp.header.header().clone();
        strip_hop_by_hop(&mut rsp_header);
        let cache_header = rsp_header.clone();

        let max_object_size = self.ctx.cache().max_object_size();
        let store_deny = self.cache_url.as_ref().map(|url| {
            match self
                .ctx
                .cache()
                .store_decision(&req.method, url, rsp.status, &rsp.header)
            {
                None => match rsp.body_type {
                    Some(HttpBodyType::ContentLength(n)) if n > max_object_size => {
                        Some(StoreDenyReason::TooLarge(n))
                    }
                    _ => None,
                },
                deny => deny,
            }
        });
        let mut tee = match store_deny {
            Some(None) => Some(BodyTee::new(max_object_size)),
            Some(Some(ref reason)) => {
                debug!("not storing {}: {reason}", req.target);
                None
            }
            None => None,
        };

        let framing = ResponseFraming::select(req.version, rsp.body_type);
        if framing == ResponseFraming::UntilClose {
            outcome.keep_alive = false;
        }
        framing.apply(&mut rsp_header);
        add_via(&mut rsp_header, rsp.version, &config.name);
        let mut head = ResponseHead::with_reason(
            req.version,
            rsp.status,
            &rsp.reason,
            rsp_header,
            outcome.keep_alive,
        );
        let buf = head.serialize(&config.name);
        outcome.head_sent = true;
        clt_w
            .write_all(&buf)
            .await
            .map_err(ServerTaskError::ClientTcpWriteFailed)?;

        let mut body_size = 0;
        let mut finished = true;
        match rsp.body_type {
            Some(body_type) => {
                let mut ups_r = client.count_reader(conn.reader());
                let mut body_reader =
                    HttpBodyReader::new(&mut ups_r, body_type, client.config().body_line_max_len);
                body_size = copy_body(
                    &mut body_reader,
                    clt_w,
                    framing == ResponseFraming::Chunked,
                    tee.as_mut(),
                    client.config().read_timeout,
                )
                .await
                .map_err(|e| match e {
                    BodyCopyError::ReadFailed(e) => ServerTaskError::from_upstream_body_read(e),
                    BodyCopyError::ReadTimeout => {
                        ServerTaskError::UpstreamAppTimeout("read response body")
                    }
                    BodyCopyError::WriteFailed(e) => ServerTaskError::ClientTcpWriteFailed(e),
                })?;
                finished = body_reader.finished();
            }
            None => {
                clt_w
                    .flush()
                    .await
                    .map_err(ServerTaskError::ClientTcpWriteFailed)?;
            }
        }

        if let Some(url) = self.cache_url {
            let entry = match tee.map(|tee| tee.into_body(finished)) {
                Some(Ok(body)) => Some(CacheEntry::new(
                    url,
                    rsp.status,
                    rsp.status_line(),
                    ResponseHeader::from(cache_header),
                    Bytes::from(body),
                    Utc::now(),
                )),
                Some(Err(reason)) => {
                    debug!("not storing {}: {reason}", req.target);
                    None
                }
                None => None,
            };
            let class = self.ctx.cache().finish(entry, self.prior, body_size);
            outcome.cache = Some(class.as_str());
        }

        Ok(rsp.keep_alive && finished)
    }
}
