/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::sync::Arc;
use std::time::Duration;

use arcstr::ArcStr;
use tokio::time::Instant;

use swarm_http::HttpBasicAuth;
use swarm_http::header::Header;

use super::{AccountStore, AuthDenied, FixedWindowLimiter, ProxyTimeUsage};
use crate::config::ProxyConfig;
use crate::serve::ServerTaskForbiddenError;
use crate::upstream::UpstreamAddr;

pub const PEER_HOP_HEADER: &str = "X-Peer-Hop";
pub const PEER_KEY_HEADER: &str = "X-Peer-Key";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProxyAccess {
    Anonymous,
    User(ArcStr),
    Peer(ArcStr),
}

impl ProxyAccess {
    pub fn user_name(&self) -> Option<ArcStr> {
        match self {
            ProxyAccess::Anonymous => None,
            ProxyAccess::User(name) | ProxyAccess::Peer(name) => Some(name.clone()),
        }
    }
}

struct PeerHopGate {
    secret: String,
    requester_limiter: FixedWindowLimiter,
    target_limiter: FixedWindowLimiter,
}

pub struct ProxyAuthGate {
    enabled: bool,
    accounts: Arc<dyn AccountStore>,
    usage: ProxyTimeUsage,
    peer_hop: Option<PeerHopGate>,
}

impl ProxyAuthGate {
    pub fn new(config: &ProxyConfig, accounts: Arc<dyn AccountStore>) -> Self {
        let peer_hop = config.peer_hop.as_ref().map(|c| PeerHopGate {
            secret: c.network_secret.clone(),
            requester_limiter: FixedWindowLimiter::new(c.window, c.requester_rate),
            target_limiter: FixedWindowLimiter::new(c.window, c.target_rate),
        });
        ProxyAuthGate {
            enabled: config.enabled,
            accounts,
            usage: ProxyTimeUsage::default(),
            peer_hop,
        }
    }

    pub fn check(
        &self,
        header: &Header,
        target: &UpstreamAddr,
        now: Instant,
    ) -> Result<ProxyAccess, AuthDenied> {
        if !self.enabled {
            return Err(AuthDenied::Forbidden(ServerTaskForbiddenError::ProxyDisabled));
        }

        if let Some(requester) = header.get(PEER_HOP_HEADER) {
            return self.check_peer_hop(requester.trim(), header, target, now);
        }

        if self.accounts.is_empty() {
            return Ok(ProxyAccess::Anonymous);
        }

        let Some(value) = header.get(http::header::PROXY_AUTHORIZATION.as_str()) else {
            return Err(AuthDenied::Unauthorized);
        };
        let Ok(Some(auth)) = HttpBasicAuth::from_authorization(value) else {
            return Err(AuthDenied::Unauthorized);
        };
        let Some(account) = self.accounts.lookup(&auth.username) else {
            return Err(AuthDenied::Unauthorized);
        };
        if !constant_time_eq::constant_time_eq(
            auth.password.as_bytes(),
            account.password.as_bytes(),
        ) {
            return Err(AuthDenied::Unauthorized);
        }
        if let Some(limit) = account.time_limit
            && self.usage.get(&account.username) >= limit
        {
            return Err(AuthDenied::Forbidden(
                ServerTaskForbiddenError::TimeLimitExceeded,
            ));
        }
        Ok(ProxyAccess::User(account.username))
    }

    fn check_peer_hop(
        &self,
        requester: &str,
        header: &Header,
        target: &UpstreamAddr,
        now: Instant,
    ) -> Result<ProxyAccess, AuthDenied> {
        let Some(gate) = &self.peer_hop else {
            return Err(AuthDenied::Forbidden(ServerTaskForbiddenError::PeerKeyMismatch));
        };
        let key = header.get(PEER_KEY_HEADER).map(str::trim).unwrap_or_default();
        if requester.is_empty()
            || !constant_time_eq::constant_time_eq(key.as_bytes(), gate.secret.as_bytes())
        {
            return Err(AuthDenied::Forbidden(ServerTaskForbiddenError::PeerKeyMismatch));
        }
        if gate.requester_limiter.check(requester, now).is_err() {
            return Err(AuthDenied::Forbidden(ServerTaskForbiddenError::RateLimited));
        }
        if gate.target_limiter.check(target.host(), now).is_err() {
            gate.requester_limiter.release(requester, now);
            return Err(AuthDenied::Forbidden(ServerTaskForbiddenError::RateLimited));
        }
        Ok(ProxyAccess::Peer(ArcStr::from(requester)))
    }

    /// Account the time spent on a finished proxy request.
    pub fn add_usage(&self, access: &ProxyAccess, used: Duration) {
        if let ProxyAccess::User(name) = access {
            self.usage.add(name, used);
        }
    }

    pub fn usage(&self, user: &str) -> Duration {
        self.usage.get(user)
    }

    pub fn sweep_limiters(&self, now: Instant) {
        if let Some(gate) = &self.peer_hop {
            gate.requester_limiter.sweep(now);
            gate.target_limiter.sweep(now);
        }
    }
}
