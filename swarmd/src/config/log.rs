/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::str::FromStr;

use anyhow::anyhow;
use yaml_rust::Yaml;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TaskLogTarget {
    #[default]
    Stdout,
    Stderr,
    Discard,
}

impl FromStr for TaskLogTarget {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stdout" => Ok(TaskLogTarget::Stdout),
            "stderr" => Ok(TaskLogTarget::Stderr),
            "discard" | "none" => Ok(TaskLogTarget::Discard),
            _ => Err(anyhow!("unsupported task log target {s}")),
        }
    }
}

#[derive(Clone, Debug)]
pub struct LogConfig {
    pub task: TaskLogTarget,
    pub channel_capacity: usize,
    pub log_uri_max_chars: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            task: TaskLogTarget::default(),
            channel_capacity: 4096,
            log_uri_max_chars: 1024,
        }
    }
}

impl LogConfig {
    pub(super) fn parse(v: &Yaml) -> anyhow::Result<Self> {
        let mut config = LogConfig::default();
        match v {
            Yaml::Hash(map) => {
                swarm_yaml::foreach_kv(map, |k, v| config.set(k, v))?;
            }
            Yaml::String(s) => {
                config.task = TaskLogTarget::from_str(s)?;
            }
            _ => return Err(anyhow!("yaml value type for 'log' should be 'map' or 'string'")),
        }
        Ok(config)
    }

    fn set(&mut self, k: &str, v: &Yaml) -> anyhow::Result<()> {
        match swarm_yaml::key::normalize(k).as_str() {
            "task" => {
                let s = swarm_yaml::value::as_string(v)?;
                self.task = TaskLogTarget::from_str(&s)?;
                Ok(())
            }
            "channel_capacity" => {
                self.channel_capacity = swarm_yaml::value::as_usize(v)?;
                Ok(())
            }
            "log_uri_max_chars" | "uri_max_chars" => {
                self.log_uri_max_chars = swarm_yaml::value::as_usize(v)?;
                Ok(())
            }
            _ => Err(anyhow!("invalid key {k}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target() {
        assert_eq!(
            TaskLogTarget::from_str("StdErr").unwrap(),
            TaskLogTarget::Stderr
        );
        assert_eq!(
            TaskLogTarget::from_str("none").unwrap(),
            TaskLogTarget::Discard
        );
        assert!(TaskLogTarget::from_str("syslog").is_err());
    }

    #[test]
    fn parse_string() {
        let config = LogConfig::parse(&Yaml::String("stderr".to_string())).unwrap();
        assert_eq!(config.task, TaskLogTarget::Stderr);
        assert_eq!(config.log_uri_max_chars, 1024);
        assert!(LogConfig::parse(&Yaml::Integer(1)).is_err());
    }
}
