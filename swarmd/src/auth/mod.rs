/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use ahash::AHashMap;
use arcstr::ArcStr;

use crate::config::ProxyUserConfig;
use crate::serve::ServerTaskForbiddenError;

mod limiter;
pub use limiter::FixedWindowLimiter;

mod proxy;
pub use proxy::{PEER_HOP_HEADER, PEER_KEY_HEADER, ProxyAccess, ProxyAuthGate};

mod server;
pub use server::check_server_auth;

#[derive(Clone, Debug)]
pub struct ProxyAccount {
    pub username: ArcStr,
    pub password: String,
    pub time_limit: Option<Duration>,
}

/// Source of the proxy accounts.
pub trait AccountStore: Send + Sync {
    fn lookup(&self, username: &str) -> Option<ProxyAccount>;

    /// No authentication is required if there is no account at all.
    fn is_empty(&self) -> bool;
}

#[derive(Default)]
pub struct StaticAccountStore {
    accounts: AHashMap<String, ProxyAccount>,
}

impl StaticAccountStore {
    pub fn new(users: &[ProxyUserConfig]) -> Self {
        let accounts = users
            .iter()
            .map(|u| {
                let account = ProxyAccount {
                    username: ArcStr::from(u.username.as_str()),
                    password: u.password.clone(),
                    time_limit: u.time_limit,
                };
                (u.username.clone(), account)
            })
            .collect();
        StaticAccountStore { accounts }
    }
}

impl AccountStore for StaticAccountStore {
    fn lookup(&self, username: &str) -> Option<ProxyAccount> {
        self.accounts.get(username).cloned()
    }

    fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

/// Accumulated proxy usage time of each account.
#[derive(Default)]
pub struct ProxyTimeUsage {
    inner: Mutex<AHashMap<ArcStr, Duration>>,
}

impl ProxyTimeUsage {
    pub fn add(&self, user: &ArcStr, used: Duration) {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        *map.entry(user.clone()).or_default() += used;
    }

    pub fn get(&self, user: &str) -> Duration {
        let map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        map.get(user).copied().unwrap_or_default()
    }
}

#[derive(Debug)]
pub enum AuthDenied {
    /// Credentials are missing or wrong, the client may retry.
    Unauthorized,
    Forbidden(ServerTaskForbiddenError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_store() {
        let store = StaticAccountStore::new(&[ProxyUserConfig {
            username: "alice".to_string(),
            password: "pw".to_string(),
            time_limit: None,
        }]);
        assert!(!store.is_empty());
        assert_eq!(store.lookup("alice").unwrap().password, "pw");
        assert!(store.lookup("bob").is_none());
        assert!(StaticAccountStore::default().is_empty());
    }

    #[test]
    fn time_usage() {
        let usage = ProxyTimeUsage::default();
        let alice = ArcStr::from("alice");
        usage.add(&alice, Duration::from_secs(2));
        usage.add(&alice, Duration::from_secs(3));
        assert_eq!(usage.get("alice"), Duration::from_secs(5));
        assert_eq!(usage.get("bob"), Duration::ZERO);
    }
}
