/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use anyhow::{Context, anyhow};
use yaml_rust::Yaml;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerAuthConfig {
    pub username: String,
    pub password: String,
    /// Path prefixes that require authentication, all paths if empty.
    pub paths: Vec<String>,
}

impl ServerAuthConfig {
    fn parse(v: &Yaml) -> anyhow::Result<Self> {
        let Yaml::Hash(map) = v else {
            return Err(anyhow!("yaml value type for 'server auth' should be 'map'"));
        };
        let mut username = None;
        let mut password = None;
        let mut paths = Vec::new();
        swarm_yaml::foreach_kv(map, |k, v| match swarm_yaml::key::normalize(k).as_str() {
            "username" | "user" => {
                username = Some(swarm_yaml::value::as_string(v)?);
                Ok(())
            }
            "password" => {
                password = Some(swarm_yaml::value::as_string(v)?);
                Ok(())
            }
            "paths" | "path" => {
                paths = swarm_yaml::value::as_list(v, swarm_yaml::value::as_string)?;
                Ok(())
            }
            _ => Err(anyhow!("invalid key {k}")),
        })?;
        let username = username.ok_or_else(|| anyhow!("no username set"))?;
        if username.contains(':') {
            return Err(anyhow!("username should not contain ':'"));
        }
        Ok(ServerAuthConfig {
            username,
            password: password.unwrap_or_default(),
            paths,
        })
    }

    pub fn protects(&self, path: &str) -> bool {
        self.paths.is_empty() || self.paths.iter().any(|p| path.starts_with(p.as_str()))
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub name: String,
    pub listen: SocketAddr,
    pub virtual_hosts: Vec<String>,
    pub keep_alive: bool,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub req_hdr_max_size: usize,
    pub body_line_max_len: usize,
    pub origin_body_max_size: usize,
    pub allow_connect: bool,
    pub connect_only_443: bool,
    pub auth_realm: String,
    pub auth: Option<ServerAuthConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            name: "swarmd".to_string(),
            listen: SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 8090),
            virtual_hosts: vec![
                "localhost".to_string(),
                "127.0.0.1".to_string(),
                "::1".to_string(),
            ],
            keep_alive: true,
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(30),
            req_hdr_max_size: 65536, // 64KiB
            body_line_max_len: 8192,
            origin_body_max_size: 1 << 20,
            allow_connect: true,
            connect_only_443: true,
            auth_realm: "swarmd".to_string(),
            auth: None,
        }
    }
}

impl ServerConfig {
    pub(super) fn parse(v: &Yaml) -> anyhow::Result<Self> {
        let Yaml::Hash(map) = v else {
            return Err(anyhow!("yaml value type for 'server' should be 'map'"));
        };
        let mut config = ServerConfig::default();
        swarm_yaml::foreach_kv(map, |k, v| config.set(k, v))?;
        Ok(config)
    }

    fn set(&mut self, k: &str, v: &Yaml) -> anyhow::Result<()> {
        match swarm_yaml::key::normalize(k).as_str() {
            "name" => {
                self.name = swarm_yaml::value::as_string(v)?;
                Ok(())
            }
            "listen" => {
                self.listen = swarm_yaml::value::as_sockaddr(v)
                    .context(format!("invalid socket address value for key {k}"))?;
                Ok(())
            }
            "virtual_hosts" | "virtual_host" => {
                let hosts = swarm_yaml::value::as_list(v, swarm_yaml::value::as_string)?;
                self.virtual_hosts = hosts.into_iter().map(|h| h.to_ascii_lowercase()).collect();
                Ok(())
            }
            "keep_alive" | "keepalive" => {
                self.keep_alive = swarm_yaml::value::as_bool(v)?;
                Ok(())
            }
            "read_timeout" => {
                self.read_timeout = swarm_yaml::humanize::as_duration(v)
                    .context(format!("invalid humanize duration value for key {k}"))?;
                Ok(())
            }
            "write_timeout" => {
                self.write_timeout = swarm_yaml::humanize::as_duration(v)
                    .context(format!("invalid humanize duration value for key {k}"))?;
                Ok(())
            }
            "req_header_max_size" | "req_hdr_max_size" => {
                self.req_hdr_max_size = swarm_yaml::humanize::as_usize(v)
                    .context(format!("invalid humanize usize value for key {k}"))?;
                Ok(())
            }
            "body_line_max_length" | "body_line_max_len" => {
                self.body_line_max_len = swarm_yaml::value::as_usize(v)?;
                Ok(())
            }
            "origin_body_max_size" => {
                self.origin_body_max_size = swarm_yaml::humanize::as_usize(v)
                    .context(format!("invalid humanize usize value for key {k}"))?;
                Ok(())
            }
            "allow_connect" => {
                self.allow_connect = swarm_yaml::value::as_bool(v)?;
                Ok(())
            }
            "connect_only_443" => {
                self.connect_only_443 = swarm_yaml::value::as_bool(v)?;
                Ok(())
            }
            "auth_realm" => {
                self.auth_realm = swarm_yaml::value::as_string(v)?;
                Ok(())
            }
            "auth" => {
                let auth = ServerAuthConfig::parse(v)
                    .context(format!("invalid server auth value for key {k}"))?;
                self.auth = Some(auth);
                Ok(())
            }
            _ => Err(anyhow!("invalid key {k}")),
        }
    }

    /// Whether the host, with or without port, names this server.
    pub fn is_local_host(&self, host: &str) -> bool {
        let host = strip_port(host);
        if self.virtual_hosts.iter().any(|h| h.eq_ignore_ascii_case(host)) {
            return true;
        }
        let ip = self.listen.ip();
        !ip.is_unspecified() && host.parse::<IpAddr>().map(|h| h == ip).unwrap_or(false)
    }
}

fn strip_port(host: &str) -> &str {
    if let Some(v6) = host.strip_prefix('[') {
        return v6.split_once(']').map(|(h, _)| h).unwrap_or(v6);
    }
    match host.rsplit_once(':') {
        Some((h, p)) if !h.contains(':') && p.bytes().all(|b| b.is_ascii_digit()) => h,
        _ => host,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yaml_rust::YamlLoader;

    #[test]
    fn local_host() {
        let config = ServerConfig::default();
        assert!(config.is_local_host("localhost"));
        assert!(config.is_local_host("LOCALHOST:8090"));
        assert!(config.is_local_host("[::1]:8090"));
        assert!(config.is_local_host("::1"));
        assert!(!config.is_local_host("a.example"));
        assert!(!config.is_local_host("a.example:8090"));
    }

    #[test]
    fn parse_auth() {
        let docs = YamlLoader::load_from_str(
            r#"
                listen: 8091
                auth:
                  username: admin
                  password: pw
                  paths: /Settings
            "#,
        )
        .unwrap();
        let config = ServerConfig::parse(&docs[0]).unwrap();
        assert_eq!(config.listen.port(), 8091);
        let auth = config.auth.unwrap();
        assert!(auth.protects("/Settings_p.html"));
        assert!(!auth.protects("/index.html"));

        let docs = YamlLoader::load_from_str("auth:\n  password: pw").unwrap();
        assert!(ServerConfig::parse(&docs[0]).is_err());
    }
}
