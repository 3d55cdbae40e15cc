/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::path::PathBuf;

use anyhow::{Context, anyhow};
use yaml_rust::Yaml;

#[derive(Clone, Debug)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_object_size: u64,
    pub max_entries: usize,
    pub directory: PathBuf,
    /// Mime type prefixes never stored, the policy defaults are used if empty.
    pub excluded_mime_types: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            enabled: true,
            max_object_size: 1 << 20, // 1MiB
            max_entries: 4096,
            directory: PathBuf::from("cache"),
            excluded_mime_types: Vec::new(),
        }
    }
}

impl CacheConfig {
    pub(super) fn parse(v: &Yaml) -> anyhow::Result<Self> {
        let Yaml::Hash(map) = v else {
            return Err(anyhow!("yaml value type for 'cache' should be 'map'"));
        };
        let mut config = CacheConfig::default();
        swarm_yaml::foreach_kv(map, |k, v| match swarm_yaml::key::normalize(k).as_str() {
            "enabled" | "enable" => {
                config.enabled = swarm_yaml::value::as_bool(v)?;
                Ok(())
            }
            "max_object_size" => {
                config.max_object_size = swarm_yaml::humanize::as_u64(v)
                    .context(format!("invalid humanize u64 value for key {k}"))?;
                Ok(())
            }
            "max_entries" => {
                config.max_entries = swarm_yaml::value::as_usize(v)?;
                if config.max_entries == 0 {
                    return Err(anyhow!("max entries should not be zero"));
                }
                Ok(())
            }
            "directory" | "dir" => {
                config.directory = PathBuf::from(swarm_yaml::value::as_string(v)?);
                Ok(())
            }
            "excluded_mime_types" => {
                config.excluded_mime_types =
                    swarm_yaml::value::as_list(v, swarm_yaml::value::as_string)?
                        .into_iter()
                        .map(|s| s.to_ascii_lowercase())
                        .collect();
                Ok(())
            }
            _ => Err(anyhow!("invalid key {k}")),
        })?;
        Ok(config)
    }
}
