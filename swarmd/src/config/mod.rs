/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use anyhow::{Context, anyhow};
use yaml_rust::{Yaml, yaml};

use crate::opts::ProcArgs;

mod cache;
mod log;
mod pool;
mod proxy;
mod server;
mod stat;

pub use cache::CacheConfig;
pub use log::{LogConfig, TaskLogTarget};
pub use pool::PoolConfig;
pub use proxy::{PeerHopConfig, ProxyConfig, ProxyUserConfig};
pub use server::{ServerAuthConfig, ServerConfig};
pub use stat::StatConfig;

#[derive(Clone, Debug, Default)]
pub struct SwarmConfig {
    pub log: LogConfig,
    pub server: ServerConfig,
    pub proxy: ProxyConfig,
    pub pool: PoolConfig,
    pub cache: CacheConfig,
    pub stat: StatConfig,
}

impl SwarmConfig {
    pub fn parse(map: &yaml::Hash) -> anyhow::Result<Self> {
        let mut config = SwarmConfig::default();
        swarm_yaml::foreach_kv(map, |k, v| config.set(k, v))?;
        config.check()?;
        Ok(config)
    }

    fn set(&mut self, k: &str, v: &Yaml) -> anyhow::Result<()> {
        match swarm_yaml::key::normalize(k).as_str() {
            "log" => {
                self.log = LogConfig::parse(v).context(format!("invalid log config for key {k}"))?;
                Ok(())
            }
            "server" => {
                self.server =
                    ServerConfig::parse(v).context(format!("invalid server config for key {k}"))?;
                Ok(())
            }
            "proxy" => {
                self.proxy =
                    ProxyConfig::parse(v).context(format!("invalid proxy config for key {k}"))?;
                Ok(())
            }
            "pool" => {
                self.pool = PoolConfig::parse(v)
                    .context(format!("invalid connection pool config for key {k}"))?;
                Ok(())
            }
            "cache" => {
                self.cache =
                    CacheConfig::parse(v).context(format!("invalid cache config for key {k}"))?;
                Ok(())
            }
            "stat" => {
                self.stat =
                    StatConfig::parse(v).context(format!("invalid stat config for key {k}"))?;
                Ok(())
            }
            _ => Err(anyhow!("invalid key {k} in main conf")),
        }
    }

    pub fn check(&self) -> anyhow::Result<()> {
        if self.pool.max_active_count == 0 {
            return Err(anyhow!("pool max active count should not be zero"));
        }
        if self.pool.max_idle_count < self.pool.min_idle_count {
            return Err(anyhow!(
                "pool max idle count {} is less than min idle count {}",
                self.pool.max_idle_count,
                self.pool.min_idle_count
            ));
        }
        if self.proxy.peer_hop.is_some() && !self.proxy.enabled {
            ::log::warn!("peer hop credentials are configured but the proxy is disabled");
        }
        Ok(())
    }
}

pub fn load(args: &ProcArgs) -> anyhow::Result<SwarmConfig> {
    let mut config = None;
    swarm_yaml::foreach_doc(&args.config_file, |_, doc| match doc {
        Yaml::Hash(map) => {
            if config.is_some() {
                return Err(anyhow!("only one yaml doc is allowed"));
            }
            config = Some(SwarmConfig::parse(map)?);
            Ok(())
        }
        _ => Err(anyhow!("yaml doc root should be hash")),
    })?;
    config.ok_or_else(|| anyhow!("no yaml doc found in {}", args.config_file.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use yaml_rust::YamlLoader;

    fn parse_str(s: &str) -> anyhow::Result<SwarmConfig> {
        let docs = YamlLoader::load_from_str(s).unwrap();
        SwarmConfig::parse(docs[0].as_hash().unwrap())
    }

    #[test]
    fn full() {
        let config = parse_str(
            r#"
            log:
              task: discard
            server:
              listen: 127.0.0.1:8090
              virtual_hosts:
                - peer.example
              keep_alive: false
            proxy:
              enabled: true
              peer_hop:
                network_secret: s3cret
                requester_rate: 10
            pool:
              max_active_count: 8
              max_idle_count: 4
              min_idle_count: 1
            cache:
              max_object_size: 2MiB
            stat:
              interval: 30s
            "#,
        )
        .unwrap();
        assert_eq!(config.log.task, TaskLogTarget::Discard);
        assert_eq!(config.server.listen.port(), 8090);
        assert!(!config.server.keep_alive);
        assert_eq!(config.proxy.peer_hop.as_ref().unwrap().requester_rate, 10);
        assert_eq!(config.pool.max_active_count, 8);
        assert_eq!(config.cache.max_object_size, 2 * 1024 * 1024);
        assert_eq!(config.stat.interval.as_secs(), 30);
    }

    #[test]
    fn invalid_key() {
        let e = parse_str("unknown: 1").unwrap_err();
        assert!(e.to_string().contains("unknown"));
        assert!(parse_str("server:\n  listen_addr: 80").is_err());
    }

    #[test]
    fn invalid_pool() {
        assert!(parse_str("pool:\n  max_idle_count: 1\n  min_idle_count: 2").is_err());
        assert!(parse_str("pool:\n  max_active_count: 0").is_err());

        let mut config = SwarmConfig::default();
        assert!(config.check().is_ok());
        config.pool.max_active_count = 0;
        assert!(config.check().is_err());
    }
}
