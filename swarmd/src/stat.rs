/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::sync::Arc;

use log::{debug, info};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use swarm_io_ext::AccountBytes;

use crate::config::StatConfig;
use crate::context::ServerContext;

#[derive(Default)]
struct TrafficRate {
    last: AccountBytes,
}

impl TrafficRate {
    /// Bytes moved since the previous call.
    fn update(&mut self, now: AccountBytes) -> AccountBytes {
        let delta = AccountBytes {
            read: now.read.saturating_sub(self.last.read),
            written: now.written.saturating_sub(self.last.written),
        };
        self.last = now;
        delta
    }
}

fn run_once(ctx: &ServerContext, config: &StatConfig, rate: &mut TrafficRate) {
    let now = Instant::now();

    let swept = ctx.registry().sweep(config.connection_stale_timeout, now);
    if swept > 0 {
        debug!("swept {swept} stale connections");
    }
    ctx.proxy_auth().sweep_limiters(now);

    let snapshot = ctx.accounting().snapshot();
    let delta = rate.update(snapshot.total);
    info!(
        "traffic: {} connections, pool {} active {} idle, cache {} entries, total in {} out {}, last period in {} out {}",
        ctx.registry().len(),
        ctx.pool().active_count(),
        ctx.pool().idle_count(),
        ctx.cache().store().len(),
        snapshot.total.read,
        snapshot.total.written,
        delta.read,
        delta.written,
    );
    for (name, bytes) in &snapshot.accounts {
        debug!("traffic of {name}: in {} out {}", bytes.read, bytes.written);
    }
}

pub fn spawn(ctx: Arc<ServerContext>, config: StatConfig) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(config.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // the first tick completes immediately
        interval.tick().await;
        let mut rate = TrafficRate::default();
        loop {
            interval.tick().await;
            run_once(&ctx, &config, &mut rate);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traffic_rate() {
        let mut rate = TrafficRate::default();
        let d = rate.update(AccountBytes {
            read: 10,
            written: 4,
        });
        assert_eq!((d.read, d.written), (10, 4));
        let d = rate.update(AccountBytes {
            read: 15,
            written: 4,
        });
        assert_eq!((d.read, d.written), (5, 0));
    }
}
