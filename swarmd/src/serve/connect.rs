/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::io;
use std::sync::Arc;

use arcstr::ArcStr;
use http::StatusCode;
use log::debug;
use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use swarm_io_ext::{CountingReader, CountingWriter};

use super::connection::RequestOutcome;
use super::forward::check_access;
use super::notes::ServerTaskNotes;
use super::request::HttpRequest;
use super::{ServerTaskError, ServerTaskForbiddenError, ServerTaskResult};
use crate::context::{ACCOUNT_TUNNEL, ServerContext};
use crate::upstream::UpstreamAddr;

/// Open a raw tunnel for CONNECT, the session ends with the tunnel.
pub(super) async fn serve_connect<R, W>(
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
    let config = ctx.server_config();
    if !config.allow_connect {
        return Err(ServerTaskForbiddenError::MethodUnavailable.into());
    }
    let Some(upstream) = &req.upstream else {
        return Err(ServerTaskError::InternalServerError("no tunnel target"));
    };
    outcome.upstream = Some(upstream.to_string());
    if config.connect_only_443 && upstream.port() != 443 {
        return Err(ServerTaskForbiddenError::PortDenied.into());
    }

    let access = check_access(ctx, req.header.header(), upstream)?;
    notes.user = access.user_name();

    let stream = connect_upstream(ctx, upstream).await?;
    let (ups_r, ups_w) = stream.into_split();

    let status_line = format!(
        "{} 200 Connection established\r\n\r\n",
        req.version.max(swarm_http::HttpVersion::Http10)
    );
    outcome.status = Some(StatusCode::OK.as_u16());
    outcome.head_sent = true;
    clt_w
        .write_all(status_line.as_bytes())
        .await
        .map_err(ServerTaskError::ClientTcpWriteFailed)?;
    clt_w
        .flush()
        .await
        .map_err(ServerTaskError::ClientTcpWriteFailed)?;

    let account = ArcStr::from(ACCOUNT_TUNNEL);
    let mut ups_r = CountingReader::new(ups_r, Arc::clone(ctx.accounting()), account.clone());
    let mut ups_w = CountingWriter::new(ups_w, Arc::clone(ctx.accounting()), account);

    let r = tokio::select! {
        r = tokio::io::copy_buf(clt_r, &mut ups_w) => {
            r.map_err(ServerTaskError::ClientTcpReadFailed)
        }
        r = tokio::io::copy(&mut ups_r, clt_w) => {
            r.map_err(ServerTaskError::UpstreamReadFailed)
        }
    };
    let _ = ups_w.shutdown().await;
    ctx.proxy_auth().add_usage(&access, notes.time_elapsed());
    debug!(
        "tunnel to {upstream} closed, {} bytes up, {} bytes down",
        ups_w.count(),
        ups_r.count()
    );
    r.map(|_| ())
}

async fn connect_upstream(ctx: &ServerContext, upstream: &UpstreamAddr) -> ServerTaskResult<TcpStream> {
    let addrs = ctx
        .dns()
        .resolve(upstream.host(), upstream.port())
        .await
        .map_err(ServerTaskError::UpstreamNotResolved)?;

    let connect_timeout = ctx.pool().config().connect_timeout;
    let mut last_err = None;
    for addr in addrs {
        match tokio::time::timeout(connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => {
                let _ = stream.set_nodelay(true);
                return Ok(stream);
            }
            Ok(Err(e)) => {
                debug!("failed to connect to {upstream} via {addr}: {e}");
                last_err = Some(e);
            }
            Err(_) => return Err(ServerTaskError::UpstreamAppTimeout("connect to upstream")),
        }
    }
    Err(ServerTaskError::UpstreamNotConnected(last_err.unwrap_or_else(
        || io::Error::new(io::ErrorKind::NotFound, "no address to connect"),
    )))
}
