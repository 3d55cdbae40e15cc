/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::net::SocketAddr;
use std::sync::Arc;

use arcstr::ArcStr;
use http::Method;
use log::debug;
use tokio::io::{AsyncBufRead, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use swarm_http::header::{Header, HeaderNameCache};
use swarm_http::{HttpHeadReadError, HttpProtocolError, HttpRequestLine, HttpVersion};
use swarm_io_ext::{CountingReader, CountingWriter, LimitedBufReadExt};

use super::notes::ServerTaskNotes;
use super::request::{HttpRequest, TargetForm};
use super::response::{ResponseHead, error_page, write_full_response};
use super::{ServerTaskError, ServerTaskResult, connect, forward, origin, persistence};
use crate::context::{ACCOUNT_CLIENT, ServerContext};
use crate::log::task::TaskLogForHttp;

const MAX_EMPTY_REQUESTS: usize = 10;

/// Per connection protocol state, reset between requests.
#[derive(Clone, Debug)]
pub struct ConnectionState {
    pub version: HttpVersion,
    pub keep_alive: bool,
    pub empty_requests: usize,
    pub served: u64,
}

impl Default for ConnectionState {
    fn default() -> Self {
        ConnectionState {
            version: HttpVersion::Http11,
            keep_alive: true,
            empty_requests: 0,
            served: 0,
        }
    }
}

/// What the handler did, for the error reply and the task log.
pub(crate) struct RequestOutcome {
    pub(crate) task_type: &'static str,
    pub(crate) head_sent: bool,
    pub(crate) keep_alive: bool,
    pub(crate) status: Option<u16>,
    pub(crate) upstream: Option<String>,
    pub(crate) cache: Option<&'static str>,
}

impl RequestOutcome {
    fn new(keep_alive: bool) -> Self {
        RequestOutcome {
            task_type: "HttpOrigin",
            head_sent: false,
            keep_alive,
            status: None,
            upstream: None,
            cache: None,
        }
    }
}

/// Serve the requests of one client connection in sequence.
pub struct HttpSession {
    ctx: Arc<ServerContext>,
    client_addr: SocketAddr,
    server_addr: SocketAddr,
    name_cache: HeaderNameCache,
    state: ConnectionState,
}

impl HttpSession {
    pub fn new(ctx: Arc<ServerContext>, client_addr: SocketAddr, server_addr: SocketAddr) -> Self {
        HttpSession {
            ctx,
            client_addr,
            server_addr,
            name_cache: HeaderNameCache::default(),
            state: ConnectionState::default(),
        }
    }

    #[inline]
    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub async fn run<R, W>(mut self, reader: R, writer: W) -> ConnectionState
    where
        R: AsyncRead + Send + Unpin,
        W: AsyncWrite + Send + Unpin,
    {
        let guard = self.ctx.registry().register(self.client_addr);
        let account = ArcStr::from(ACCOUNT_CLIENT);
        let mut clt_r = CountingReader::new(
            BufReader::new(reader),
            Arc::clone(self.ctx.accounting()),
            account.clone(),
        );
        let mut clt_w = CountingWriter::new(writer, Arc::clone(self.ctx.accounting()), account);

        loop {
            let rd_start = clt_r.count();
            let wr_start = clt_w.count();

            let read_timeout = self.ctx.server_config().read_timeout;
            let req = match tokio::time::timeout(read_timeout, self.read_request(&mut clt_r)).await
            {
                Ok(Ok(Some(req))) => req,
                Ok(Ok(None)) => break,
                Ok(Err(e)) => {
                    debug!("bad request from {}: {e}", self.client_addr);
                    self.reply_error(&mut clt_w, HttpVersion::Http11, &e).await;
                    break;
                }
                Err(_) => {
                    debug!("client {} idle timeout", self.client_addr);
                    break;
                }
            };
            guard.touch();
            self.state.version = req.version;
            self.state.served += 1;

            let mut notes = ServerTaskNotes::new(self.client_addr, self.server_addr);
            let keep_alive =
                persistence::decide_keep_alive(self.ctx.server_config().keep_alive, &req);
            let mut outcome = RequestOutcome::new(keep_alive);
            let e = match self
                .handle(&req, &mut notes, &mut outcome, &mut clt_r, &mut clt_w)
                .await
            {
                Ok(()) => ServerTaskError::Finished,
                Err(e) => {
                    outcome.keep_alive = false;
                    if !outcome.head_sent && !e.is_client_disconnected() {
                        outcome.status = self.reply_error(&mut clt_w, req.version, &e).await;
                    }
                    e
                }
            };
            let _ = clt_w.flush().await;

            if e.is_client_disconnected() {
                debug!("client {} disconnected: {e}", self.client_addr);
            } else if e.is_timeout() {
                debug!("request from {} timed out: {e}", self.client_addr);
            }
            if let Some(logger) = self.ctx.task_logger() {
                let user_agent = req.header.user_agent();
                let task_log = TaskLogForHttp {
                    logger,
                    task_notes: &notes,
                    method: &req.method,
                    uri: &req.target,
                    uri_max_chars: self.ctx.log_config().log_uri_max_chars,
                    version: req.version,
                    user_agent,
                    upstream: outcome.upstream.take(),
                    status: outcome.status,
                    cache: outcome.cache,
                    keep_alive: outcome.keep_alive,
                    client_rd_bytes: clt_r.count() - rd_start,
                    client_wr_bytes: clt_w.count() - wr_start,
                };
                task_log.log(outcome.task_type, &e);
            }

            self.state.keep_alive = outcome.keep_alive;
            if !outcome.keep_alive {
                break;
            }
        }

        let _ = clt_w.shutdown().await;
        self.state
    }

    async fn read_request<R>(&mut self, reader: &mut R) -> ServerTaskResult<Option<HttpRequest>>
    where
        R: AsyncBufRead + Unpin,
    {
        let max_size = self.ctx.server_config().req_hdr_max_size;
        let mut line = Vec::<u8>::with_capacity(256);
        loop {
            line.clear();
            let (found, nr) = reader
                .limited_read_until(b'\n', max_size, &mut line)
                .await
                .map_err(ServerTaskError::ClientTcpReadFailed)?;
            if nr == 0 {
                return Ok(None);
            }
            if !found {
                return if nr >= max_size {
                    Err(HttpProtocolError::TooLargeHeader(max_size).into())
                } else {
                    Err(ServerTaskError::ClosedByClient)
                };
            }
            if HttpRequestLine::is_empty_line(&line) {
                self.state.empty_requests += 1;
                if self.state.empty_requests > MAX_EMPTY_REQUESTS {
                    debug!("too many empty requests from {}", self.client_addr);
                    return Ok(None);
                }
                continue;
            }
            self.state.empty_requests = 0;
            break;
        }

        let mut req = HttpRequest::parse_line(&line)?;
        let header = if req.version.has_header() {
            swarm_http::read_header_block(
                reader,
                max_size - line.len(),
                Header::with_name_cache(self.name_cache.clone()),
            )
            .await
            .map_err(|e| match e {
                HttpHeadReadError::Closed => ServerTaskError::ClosedByClient,
                HttpHeadReadError::IoFailed(e) => ServerTaskError::ClientTcpReadFailed(e),
                HttpHeadReadError::Protocol(e) => ServerTaskError::InvalidClientProtocol(e),
            })?
        } else {
            Header::new()
        };
        req.set_header(header)?;
        req.header.set_client_addr(self.client_addr);
        Ok(Some(req))
    }

    async fn handle<R, W>(
        &mut self,
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
        if req.version == HttpVersion::Http11 && req.header.host().is_none() {
            return Err(HttpProtocolError::MissingHostHeader.into());
        }

        let ctx = Arc::clone(&self.ctx);
        if req.method == Method::CONNECT {
            outcome.task_type = "HttpConnect";
            outcome.keep_alive = false;
            return connect::serve_connect(&ctx, req, notes, outcome, clt_r, clt_w).await;
        }

        if self.is_local(req) {
            outcome.task_type = "HttpOrigin";
            origin::serve_origin(&ctx, req, outcome, clt_r, clt_w).await
        } else {
            outcome.task_type = "HttpForward";
            forward::serve_forward(&ctx, req, notes, outcome, clt_r, clt_w).await
        }
    }

    fn is_local(&self, req: &HttpRequest) -> bool {
        let config = self.ctx.server_config();
        match req.form {
            TargetForm::Absolute => req
                .upstream
                .as_ref()
                .map(|u| config.is_local_host(u.host()) && u.port() == self.server_addr.port())
                .unwrap_or(false),
            _ => match req.header.host() {
                Some(host) => config.is_local_host(host),
                None => true,
            },
        }
    }

    /// Send an error page, returns the status code sent.
    async fn reply_error<W>(
        &self,
        clt_w: &mut W,
        version: HttpVersion,
        e: &ServerTaskError,
    ) -> Option<u16>
    where
        W: AsyncWrite + Unpin,
    {
        let status = e.status_code()?;
        let (mut header, body) = error_page(status, e.brief());
        match e {
            ServerTaskError::ClientAuthFailed => {
                let realm = &self.ctx.server_config().auth_realm;
                header.put("WWW-Authenticate", format!("Basic realm=\"{realm}\""));
            }
            ServerTaskError::ProxyAuthRequired => {
                let realm = &self.ctx.proxy_config().auth_realm;
                header.put(
                    "Proxy-Authenticate",
                    swarm_http::proxy_authenticate_basic(realm),
                );
            }
            _ => {}
        }
        let head = ResponseHead::new(version, status, header, false);
        let server_name = &self.ctx.server_config().name;
        match write_full_response(clt_w, head, &body, false, server_name).await {
            Ok(_) => Some(status.as_u16()),
            Err(e) => {
                debug!("failed to send error reply to {}: {e}", self.client_addr);
                None
            }
        }
    }
}
