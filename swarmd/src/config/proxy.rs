/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::time::Duration;

use anyhow::{Context, anyhow};
use yaml_rust::Yaml;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProxyUserConfig {
    pub username: String,
    pub password: String,
    /// Accumulated proxy usage allowed for this account.
    pub time_limit: Option<Duration>,
}

impl ProxyUserConfig {
    fn parse(v: &Yaml) -> anyhow::Result<Self> {
        let Yaml::Hash(map) = v else {
            return Err(anyhow!("yaml value type for 'proxy user' should be 'map'"));
        };
        let mut username = None;
        let mut password = String::new();
        let mut time_limit = None;
        swarm_yaml::foreach_kv(map, |k, v| match swarm_yaml::key::normalize(k).as_str() {
            "username" | "name" => {
                username = Some(swarm_yaml::value::as_string(v)?);
                Ok(())
            }
            "password" => {
                password = swarm_yaml::value::as_string(v)?;
                Ok(())
            }
            "time_limit" => {
                let limit = swarm_yaml::humanize::as_duration(v)
                    .context(format!("invalid humanize duration value for key {k}"))?;
                time_limit = Some(limit);
                Ok(())
            }
            _ => Err(anyhow!("invalid key {k}")),
        })?;
        let username = username.ok_or_else(|| anyhow!("no username set"))?;
        if username.is_empty() || username.contains(':') {
            return Err(anyhow!("invalid username {username}"));
        }
        Ok(ProxyUserConfig {
            username,
            password,
            time_limit,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerHopConfig {
    pub network_secret: String,
    /// Max requests of one requester in one window.
    pub requester_rate: usize,
    /// Max requests to one target host in one window.
    pub target_rate: usize,
    pub window: Duration,
}

impl PeerHopConfig {
    fn parse(v: &Yaml) -> anyhow::Result<Self> {
        let Yaml::Hash(map) = v else {
            return Err(anyhow!("yaml value type for 'peer hop' should be 'map'"));
        };
        let mut config = PeerHopConfig {
            network_secret: String::new(),
            requester_rate: 60,
            target_rate: 120,
            window: Duration::from_secs(60),
        };
        swarm_yaml::foreach_kv(map, |k, v| match swarm_yaml::key::normalize(k).as_str() {
            "network_secret" | "secret" => {
                config.network_secret = swarm_yaml::value::as_string(v)?;
                Ok(())
            }
            "requester_rate" => {
                config.requester_rate = swarm_yaml::value::as_usize(v)?;
                Ok(())
            }
            "target_rate" => {
                config.target_rate = swarm_yaml::value::as_usize(v)?;
                Ok(())
            }
            "window" | "rate_window" => {
                config.window = swarm_yaml::humanize::as_duration(v)
                    .context(format!("invalid humanize duration value for key {k}"))?;
                Ok(())
            }
            _ => Err(anyhow!("invalid key {k}")),
        })?;
        if config.network_secret.is_empty() {
            return Err(anyhow!("no network secret set"));
        }
        if config.window.is_zero() {
            return Err(anyhow!("rate window should not be zero"));
        }
        Ok(config)
    }
}

#[derive(Clone, Debug)]
pub struct ProxyConfig {
    pub enabled: bool,
    pub auth_realm: String,
    pub users: Vec<ProxyUserConfig>,
    pub peer_hop: Option<PeerHopConfig>,
    pub upstream_read_timeout: Duration,
    pub rsp_hdr_max_size: usize,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        ProxyConfig {
            enabled: true,
            auth_realm: "swarmd proxy".to_string(),
            users: Vec::new(),
            peer_hop: None,
            upstream_read_timeout: Duration::from_secs(60),
            rsp_hdr_max_size: 65536, // 64KiB
        }
    }
}

impl ProxyConfig {
    pub(super) fn parse(v: &Yaml) -> anyhow::Result<Self> {
        let Yaml::Hash(map) = v else {
            return Err(anyhow!("yaml value type for 'proxy' should be 'map'"));
        };
        let mut config = ProxyConfig::default();
        swarm_yaml::foreach_kv(map, |k, v| config.set(k, v))?;
        Ok(config)
    }

    fn set(&mut self, k: &str, v: &Yaml) -> anyhow::Result<()> {
        match swarm_yaml::key::normalize(k).as_str() {
            "enabled" | "enable" => {
                self.enabled = swarm_yaml::value::as_bool(v)?;
                Ok(())
            }
            "auth_realm" => {
                self.auth_realm = swarm_yaml::value::as_string(v)?;
                Ok(())
            }
            "users" | "user" => {
                self.users = swarm_yaml::value::as_list(v, ProxyUserConfig::parse)
                    .context(format!("invalid proxy user list value for key {k}"))?;
                Ok(())
            }
            "peer_hop" => {
                let peer = PeerHopConfig::parse(v)
                    .context(format!("invalid peer hop config value for key {k}"))?;
                self.peer_hop = Some(peer);
                Ok(())
            }
            "upstream_read_timeout" => {
                self.upstream_read_timeout = swarm_yaml::humanize::as_duration(v)
                    .context(format!("invalid humanize duration value for key {k}"))?;
                Ok(())
            }
            "rsp_header_max_size" | "rsp_hdr_max_size" => {
                self.rsp_hdr_max_size = swarm_yaml::humanize::as_usize(v)
                    .context(format!("invalid humanize usize value for key {k}"))?;
                Ok(())
            }
            _ => Err(anyhow!("invalid key {k}")),
        }
    }
}
