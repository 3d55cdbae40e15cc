/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::sync::Arc;

use slog::Logger;

use swarm_io_ext::ByteAccounting;

use crate::auth::{AccountStore, ProxyAuthGate, StaticAccountStore};
use crate::cache::ProxyCache;
use crate::client::{HttpClient, HttpClientConfig};
use crate::config::{LogConfig, ProxyConfig, ServerConfig, SwarmConfig};
use crate::pool::ConnectionPool;
use crate::resolve::DnsCache;
use crate::serve::{ConnectionRegistry, NotFoundHandler, OriginHandler};

pub const ACCOUNT_CLIENT: &str = "http-client";
pub const ACCOUNT_PROXY: &str = "http-proxy";
pub const ACCOUNT_TUNNEL: &str = "http-tunnel";
pub const ACCOUNT_CRAWLER: &str = "http-crawler";

/// Shared state of one server, built once at startup.
pub struct ServerContext {
    server_config: Arc<ServerConfig>,
    proxy_config: Arc<ProxyConfig>,
    log_config: LogConfig,
    accounting: Arc<ByteAccounting>,
    dns: Arc<DnsCache>,
    pool: Arc<ConnectionPool>,
    proxy_client: HttpClient,
    cache: ProxyCache,
    proxy_auth: ProxyAuthGate,
    origin: Arc<dyn OriginHandler>,
    task_logger: Option<Logger>,
    registry: Arc<ConnectionRegistry>,
}

impl ServerContext {
    pub fn new(config: &SwarmConfig) -> anyhow::Result<Self> {
        config.check()?;
        let task_logger = crate::log::task::build_logger(&config.log, &config.server.name)?;
        Ok(ServerContext::with_logger(config, task_logger))
    }

    /// Build without starting the task log thread.
    pub fn with_logger(config: &SwarmConfig, task_logger: Option<Logger>) -> Self {
        let accounting = Arc::new(ByteAccounting::new());
        let dns = Arc::new(DnsCache::default());
        let pool = Arc::new(ConnectionPool::new(config.pool.clone(), Arc::clone(&dns)));
        let client_config = HttpClientConfig {
            rsp_hdr_max_size: config.proxy.rsp_hdr_max_size,
            read_timeout: config.proxy.upstream_read_timeout,
            body_line_max_len: config.server.body_line_max_len,
        };
        let proxy_client = HttpClient::new(
            Arc::clone(&pool),
            Arc::clone(&accounting),
            ACCOUNT_PROXY,
            client_config,
        );
        let accounts = Arc::new(StaticAccountStore::new(&config.proxy.users));

        ServerContext {
            server_config: Arc::new(config.server.clone()),
            proxy_config: Arc::new(config.proxy.clone()),
            log_config: config.log.clone(),
            accounting,
            dns,
            pool,
            proxy_client,
            cache: ProxyCache::new(&config.cache),
            proxy_auth: ProxyAuthGate::new(&config.proxy, accounts),
            origin: Arc::new(NotFoundHandler),
            task_logger,
            registry: Arc::new(ConnectionRegistry::default()),
        }
    }

    pub fn set_origin(mut self, origin: Arc<dyn OriginHandler>) -> Self {
        self.origin = origin;
        self
    }

    pub fn set_accounts(mut self, accounts: Arc<dyn AccountStore>) -> Self {
        self.proxy_auth = ProxyAuthGate::new(&self.proxy_config, accounts);
        self
    }

    pub fn set_cache(mut self, cache: ProxyCache) -> Self {
        self.cache = cache;
        self
    }

    #[inline]
    pub fn server_config(&self) -> &ServerConfig {
        &self.server_config
    }

    #[inline]
    pub fn proxy_config(&self) -> &ProxyConfig {
        &self.proxy_config
    }

    #[inline]
    pub fn log_config(&self) -> &LogConfig {
        &self.log_config
    }

    #[inline]
    pub fn accounting(&self) -> &Arc<ByteAccounting> {
        &self.accounting
    }

    #[inline]
    pub fn dns(&self) -> &Arc<DnsCache> {
        &self.dns
    }

    #[inline]
    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    #[inline]
    pub fn proxy_client(&self) -> &HttpClient {
        &self.proxy_client
    }

    /// Client for the crawler, sharing the pool with the proxy.
    pub fn crawler_client(&self) -> HttpClient {
        self.proxy_client.with_account(ACCOUNT_CRAWLER)
    }

    #[inline]
    pub fn cache(&self) -> &ProxyCache {
        &self.cache
    }

    #[inline]
    pub fn proxy_auth(&self) -> &ProxyAuthGate {
        &self.proxy_auth
    }

    #[inline]
    pub fn origin(&self) -> &Arc<dyn OriginHandler> {
        &self.origin
    }

    #[inline]
    pub fn task_logger(&self) -> Option<&Logger> {
        self.task_logger.as_ref()
    }

    #[inline]
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }
}
