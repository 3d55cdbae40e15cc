/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use log::{debug, info, warn};
use tokio::net::{TcpListener, TcpStream};

use super::HttpSession;
use crate::context::ServerContext;

/// The listening side, one session task per accepted connection.
pub struct HttpServer {
    ctx: Arc<ServerContext>,
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl HttpServer {
    pub async fn bind(ctx: Arc<ServerContext>) -> anyhow::Result<Self> {
        let listen = ctx.server_config().listen;
        let listener = TcpListener::bind(listen)
            .await
            .context(format!("failed to listen on {listen}"))?;
        let local_addr = listener
            .local_addr()
            .context("failed to get local listen address")?;
        Ok(HttpServer {
            ctx,
            listener,
            local_addr,
        })
    }

    #[inline]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept connections until `quit` completes.
    pub async fn run<F>(self, quit: F)
    where
        F: Future<Output = ()>,
    {
        info!(
            "server {} listening on {}",
            self.ctx.server_config().name,
            self.local_addr
        );
        tokio::pin!(quit);
        loop {
            tokio::select! {
                biased;

                _ = &mut quit => {
                    info!("server {} stop accepting", self.ctx.server_config().name);
                    break;
                }
                r = self.listener.accept() => {
                    match r {
                        Ok((stream, peer_addr)) => self.spawn_session(stream, peer_addr),
                        Err(e) => {
                            warn!("accept on {} failed: {e}", self.local_addr);
                            // fd exhaustion and the like, back off a little
                            tokio::time::sleep(Duration::from_millis(50)).await;
                        }
                    }
                }
            }
        }
    }

    fn spawn_session(&self, stream: TcpStream, peer_addr: SocketAddr) {
        let local_addr = stream.local_addr().unwrap_or(self.local_addr);
        let _ = stream.set_nodelay(true);
        let ctx = Arc::clone(&self.ctx);
        tokio::spawn(async move {
            let (r, w) = stream.into_split();
            let state = HttpSession::new(ctx, peer_addr, local_addr).run(r, w).await;
            debug!(
                "{local_addr} - {peer_addr} session closed after {} requests",
                state.served
            );
        });
    }
}
