/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::time::Duration;

use anyhow::{Context, anyhow};
use yaml_rust::Yaml;

#[derive(Clone, Debug)]
pub struct StatConfig {
    pub interval: Duration,
    /// Registry entries without activity for this long are swept.
    pub connection_stale_timeout: Duration,
}

impl Default for StatConfig {
    fn default() -> Self {
        StatConfig {
            interval: Duration::from_secs(60),
            connection_stale_timeout: Duration::from_secs(600),
        }
    }
}

impl StatConfig {
    pub(super) fn parse(v: &Yaml) -> anyhow::Result<Self> {
        let Yaml::Hash(map) = v else {
            return Err(anyhow!("yaml value type for 'stat' should be 'map'"));
        };
        let mut config = StatConfig::default();
        swarm_yaml::foreach_kv(map, |k, v| match swarm_yaml::key::normalize(k).as_str() {
            "interval" | "emit_interval" => {
                config.interval = swarm_yaml::humanize::as_duration(v)
                    .context(format!("invalid humanize duration value for key {k}"))?;
                Ok(())
            }
            "connection_stale_timeout" => {
                config.connection_stale_timeout = swarm_yaml::humanize::as_duration(v)
                    .context(format!("invalid humanize duration value for key {k}"))?;
                Ok(())
            }
            _ => Err(anyhow!("invalid key {k}")),
        })?;
        if config.interval.is_zero() {
            return Err(anyhow!("stat interval should not be zero"));
        }
        Ok(config)
    }
}
