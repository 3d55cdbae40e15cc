/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use ahash::AHashMap;
use tokio::time::Instant;

#[derive(Clone, Debug)]
pub struct ConnectionInfo {
    pub client_addr: SocketAddr,
    pub created: Instant,
    pub last_active: Instant,
    pub served: u64,
}

/// Live inbound connections.
#[derive(Default)]
pub struct ConnectionRegistry {
    inner: Mutex<AHashMap<u64, ConnectionInfo>>,
    next_id: AtomicU64,
}

impl ConnectionRegistry {
    pub fn register(self: &Arc<Self>, client_addr: SocketAddr) -> ConnectionGuard {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let now = Instant::now();
        let info = ConnectionInfo {
            client_addr,
            created: now,
            last_active: now,
            served: 0,
        };
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        map.insert(id, info);
        ConnectionGuard {
            registry: Arc::clone(self),
            id,
        }
    }

    fn update(&self, id: u64) {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(info) = map.get_mut(&id) {
            info.last_active = Instant::now();
            info.served += 1;
        }
    }

    fn remove(&self, id: u64) {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        map.remove(&id);
    }

    pub fn len(&self) -> usize {
        let map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<ConnectionInfo> {
        let map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        map.values().cloned().collect()
    }

    /// Forget connections with no activity for `stale_timeout`.
    pub fn sweep(&self, stale_timeout: Duration, now: Instant) -> usize {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let old = map.len();
        map.retain(|_, info| now.saturating_duration_since(info.last_active) < stale_timeout);
        old - map.len()
    }
}

/// Removes the connection from the registry on drop.
pub struct ConnectionGuard {
    registry: Arc<ConnectionRegistry>,
    id: u64,
}

impl ConnectionGuard {
    /// Record a served request.
    pub fn touch(&self) {
        self.registry.update(self.id);
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.registry.remove(self.id);
    }
}
