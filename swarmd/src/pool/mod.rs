/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, PoisonError};

use ahash::AHashMap;
use log::debug;
use thiserror::Error;
use tokio::io::BufReader;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::PoolConfig;
use crate::resolve::DnsCache;
use crate::upstream::UpstreamAddr;

mod connection;
pub use connection::PooledConnection;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("resolve failed: {0:?}")]
    ResolveFailed(io::Error),
    #[error("connect failed: {0:?}")]
    ConnectFailed(io::Error),
    #[error("connect timeout")]
    ConnectTimeout,
    #[error("pool closed")]
    Closed,
}

struct IdleConnection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    idle_since: Instant,
}

impl IdleConnection {
    /// Any readable data or EOF on an idle connection makes it unusable.
    fn is_alive(&self) -> bool {
        let mut buf = [0u8; 1];
        match self.reader.get_ref().try_read(&mut buf) {
            Ok(_) => false,
            Err(e) => e.kind() == io::ErrorKind::WouldBlock,
        }
    }
}

#[derive(Default)]
struct PoolInner {
    idle: AHashMap<UpstreamAddr, VecDeque<IdleConnection>>,
    idle_count: usize,
    recent: AHashMap<UpstreamAddr, Instant>,
}

impl PoolInner {
    fn pop_idle(&mut self, upstream: &UpstreamAddr) -> Option<IdleConnection> {
        let queue = self.idle.get_mut(upstream)?;
        let conn = queue.pop_back();
        if conn.is_some() {
            self.idle_count -= 1;
        }
        if queue.is_empty() {
            self.idle.remove(upstream);
        }
        conn
    }

    fn push_idle(&mut self, upstream: UpstreamAddr, conn: IdleConnection) {
        self.idle.entry(upstream).or_default().push_back(conn);
        self.idle_count += 1;
    }
}

/// Bounded pool of outbound connections.
///
/// Borrowed connections hold a permit of a fair semaphore, so a borrow waits
/// in FIFO order once `max_active_count` connections are in use.
pub struct ConnectionPool {
    config: PoolConfig,
    dns: Arc<DnsCache>,
    semaphore: Arc<Semaphore>,
    inner: Mutex<PoolInner>,
}

impl ConnectionPool {
    pub fn new(config: PoolConfig, dns: Arc<DnsCache>) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_active_count));
        ConnectionPool {
            config,
            dns,
            semaphore,
            inner: Mutex::new(PoolInner::default()),
        }
    }

    #[inline]
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn active_count(&self) -> usize {
        self.config.max_active_count - self.semaphore.available_permits()
    }

    pub fn idle_count(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.idle_count
    }

    pub async fn borrow(&self, upstream: &UpstreamAddr) -> Result<PooledConnection, PoolError> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Closed)?;

        let now = Instant::now();
        loop {
            let idle = {
                let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
                inner.recent.insert(upstream.clone(), now);
                inner.pop_idle(upstream)
            };
            let Some(idle) = idle else {
                break;
            };
            if now.saturating_duration_since(idle.idle_since) < self.config.idle_timeout
                && idle.is_alive()
            {
                return Ok(PooledConnection::new(
                    upstream.clone(),
                    idle.reader,
                    idle.writer,
                    true,
                    permit,
                ));
            }
            debug!("dropped stale idle connection to {upstream}");
        }

        let (reader, writer) = self.connect(upstream).await?;
        Ok(PooledConnection::new(
            upstream.clone(),
            reader,
            writer,
            false,
            permit,
        ))
    }

    async fn connect(
        &self,
        upstream: &UpstreamAddr,
    ) -> Result<(BufReader<OwnedReadHalf>, OwnedWriteHalf), PoolError> {
        let addrs = self
            .dns
            .resolve(upstream.host(), upstream.port())
            .await
            .map_err(PoolError::ResolveFailed)?;

        let mut last_err = None;
        for addr in addrs {
            match tokio::time::timeout(self.config.connect_timeout, TcpStream::connect(addr)).await
            {
                Ok(Ok(stream)) => {
                    let _ = stream.set_nodelay(true);
                    let (r, w) = stream.into_split();
                    return Ok((BufReader::new(r), w));
                }
                Ok(Err(e)) => {
                    debug!("failed to connect to {upstream} via {addr}: {e}");
                    last_err = Some(PoolError::ConnectFailed(e));
                }
                Err(_) => last_err = Some(PoolError::ConnectTimeout),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            PoolError::ConnectFailed(io::Error::new(
                io::ErrorKind::NotFound,
                "no address to connect",
            ))
        }))
    }

    /// Return a connection, it is kept for reuse only if the last response
    /// has been fully read and no extra data is buffered.
    pub fn release(&self, conn: PooledConnection) {
        let upstream = conn.upstream().clone();
        let Some((reader, writer)) = conn.into_reusable() else {
            debug!("invalidated connection to {upstream} on release");
            return;
        };
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.idle_count >= self.config.max_idle_count {
            return;
        }
        inner.push_idle(
            upstream,
            IdleConnection {
                reader,
                writer,
                idle_since: Instant::now(),
            },
        );
    }

    /// Destroy a connection explicitly.
    pub fn invalidate(&self, conn: PooledConnection) {
        debug!("invalidated connection to {}", conn.upstream());
        drop(conn);
    }

    /// Drop idle connections and recent upstream records older than the idle timeout.
    pub fn evict_expired(&self, now: Instant) -> usize {
        let timeout = self.config.idle_timeout;
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let mut evicted = 0;
        inner.idle.retain(|_, queue| {
            let before = queue.len();
            queue.retain(|c| now.saturating_duration_since(c.idle_since) < timeout);
            evicted += before - queue.len();
            !queue.is_empty()
        });
        inner.idle_count -= evicted;
        inner
            .recent
            .retain(|_, used| now.saturating_duration_since(*used) < timeout);
        evicted
    }

    fn idle_shortage(&self) -> Vec<(UpstreamAddr, usize)> {
        let min_idle = self.config.min_idle_count;
        if min_idle == 0 {
            return Vec::new();
        }
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let mut room = self.config.max_idle_count.saturating_sub(inner.idle_count);
        let mut shortage = Vec::new();
        for upstream in inner.recent.keys() {
            if room == 0 {
                break;
            }
            let have = inner.idle.get(upstream).map(|q| q.len()).unwrap_or(0);
            if have < min_idle {
                let n = (min_idle - have).min(room);
                room -= n;
                shortage.push((upstream.clone(), n));
            }
        }
        shortage
    }

    /// Open idle connections to the recently used upstreams.
    pub async fn fill_min_idle(&self) -> usize {
        let mut opened = 0;
        for (upstream, n) in self.idle_shortage() {
            for _ in 0..n {
                match self.connect(&upstream).await {
                    Ok((reader, writer)) => {
                        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
                        if inner.idle_count >= self.config.max_idle_count {
                            return opened;
                        }
                        inner.push_idle(
                            upstream.clone(),
                            IdleConnection {
                                reader,
                                writer,
                                idle_since: Instant::now(),
                            },
                        );
                        opened += 1;
                    }
                    Err(e) => {
                        debug!("failed to open idle connection to {upstream}: {e}");
                        break;
                    }
                }
            }
        }
        opened
    }

    pub fn spawn_idle_check(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.config.check_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let evicted = self.evict_expired(Instant::now());
                if evicted > 0 {
                    debug!("evicted {evicted} idle connections");
                }
                self.fill_min_idle().await;
            }
        })
    }
}
