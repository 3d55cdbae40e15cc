/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::time::Duration;

use anyhow::{Context, anyhow};
use yaml_rust::Yaml;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_active_count: usize,
    pub max_idle_count: usize,
    /// Kept for each upstream used within the last idle timeout.
    pub min_idle_count: usize,
    pub idle_timeout: Duration,
    pub check_interval: Duration,
    pub connect_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            max_active_count: 64,
            max_idle_count: 32,
            min_idle_count: 0,
            idle_timeout: Duration::from_secs(60),
            check_interval: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl PoolConfig {
    pub(super) fn parse(v: &Yaml) -> anyhow::Result<Self> {
        let Yaml::Hash(map) = v else {
            return Err(anyhow!("yaml value type for 'pool' should be 'map'"));
        };
        let mut config = PoolConfig::default();
        swarm_yaml::foreach_kv(map, |k, v| match swarm_yaml::key::normalize(k).as_str() {
            "max_active_count" | "max_active" => {
                config.max_active_count = swarm_yaml::value::as_usize(v)?;
                if config.max_active_count == 0 {
                    return Err(anyhow!("max active count should not be zero"));
                }
                Ok(())
            }
            "max_idle_count" | "max_idle" => {
                config.max_idle_count = swarm_yaml::value::as_usize(v)?;
                Ok(())
            }
            "min_idle_count" | "min_idle" => {
                config.min_idle_count = swarm_yaml::value::as_usize(v)?;
                Ok(())
            }
            "idle_timeout" => {
                config.idle_timeout = swarm_yaml::humanize::as_duration(v)
                    .context(format!("invalid humanize duration value for key {k}"))?;
                Ok(())
            }
            "check_interval" => {
                config.check_interval = swarm_yaml::humanize::as_duration(v)
                    .context(format!("invalid humanize duration value for key {k}"))?;
                Ok(())
            }
            "connect_timeout" => {
                config.connect_timeout = swarm_yaml::humanize::as_duration(v)
                    .context(format!("invalid humanize duration value for key {k}"))?;
                Ok(())
            }
            _ => Err(anyhow!("invalid key {k}")),
        })?;
        Ok(config)
    }
}
