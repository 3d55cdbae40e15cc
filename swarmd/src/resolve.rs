/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use lru::LruCache;
use tokio::time::Instant;

const DEFAULT_CAPACITY: NonZeroUsize = NonZeroUsize::new(1024).unwrap();
const DEFAULT_TTL: Duration = Duration::from_secs(60);

struct CachedRecord {
    ips: Vec<IpAddr>,
    expire: Instant,
}

/// Resolved addresses of recently used hosts.
///
/// The lookup itself is done by the system resolver.
pub struct DnsCache {
    inner: Mutex<LruCache<String, CachedRecord>>,
    ttl: Duration,
}

impl Default for DnsCache {
    fn default() -> Self {
        DnsCache::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }
}

impl DnsCache {
    pub fn new(capacity: NonZeroUsize, ttl: Duration) -> Self {
        DnsCache {
            inner: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    pub fn get(&self, host: &str) -> Option<Vec<IpAddr>> {
        let mut cache = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        match cache.get(host) {
            Some(r) if r.expire > Instant::now() => Some(r.ips.clone()),
            Some(_) => {
                cache.pop(host);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, host: &str, ips: Vec<IpAddr>) {
        if ips.is_empty() {
            return;
        }
        let record = CachedRecord {
            ips,
            expire: Instant::now() + self.ttl,
        };
        let mut cache = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        cache.put(host.to_string(), record);
    }

    pub fn len(&self) -> usize {
        let cache = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub async fn resolve(&self, host: &str, port: u16) -> io::Result<Vec<SocketAddr>> {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(vec![SocketAddr::new(ip, port)]);
        }
        if let Some(ips) = self.get(host) {
            return Ok(ips.into_iter().map(|ip| SocketAddr::new(ip, port)).collect());
        }

        let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host, port)).await?.collect();
        if addrs.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no address found for {host}"),
            ));
        }
        self.insert(host, addrs.iter().map(|a| a.ip()).collect());
        Ok(addrs)
    }
}
