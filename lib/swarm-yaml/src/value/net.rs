/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::str::FromStr;

use anyhow::anyhow;
use yaml_rust::Yaml;

/// A socket address, or a bare port which listens on all addresses.
pub fn as_sockaddr(v: &Yaml) -> anyhow::Result<SocketAddr> {
    match v {
        Yaml::String(s) => {
            if let Ok(port) = u16::from_str(s) {
                return Ok(SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), port));
            }
            SocketAddr::from_str(s).map_err(|e| anyhow!("invalid socket address {s}: {e}"))
        }
        Yaml::Integer(i) => {
            let port = u16::try_from(*i).map_err(|e| anyhow!("invalid port {i}: {e}"))?;
            Ok(SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), port))
        }
        _ => Err(anyhow!(
            "yaml value type for 'SocketAddr' should be 'string' or 'integer'"
        )),
    }
}

/// A `host:port` string, the port is required.
pub fn as_host_port(v: &Yaml) -> anyhow::Result<(String, u16)> {
    let Yaml::String(s) = v else {
        return Err(anyhow!("yaml value type for 'host:port' should be 'string'"));
    };
    let Some((host, port)) = s.rsplit_once(':') else {
        return Err(anyhow!("no port found in {s}"));
    };
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        return Err(anyhow!("empty host in {s}"));
    }
    let port = u16::from_str(port).map_err(|e| anyhow!("invalid port in {s}: {e}"))?;
    Ok((host.to_string(), port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn t_sockaddr() {
        assert_eq!(
            as_sockaddr(&yaml_str!("127.0.0.1:8090")).unwrap(),
            SocketAddr::from_str("127.0.0.1:8090").unwrap()
        );
        assert_eq!(as_sockaddr(&Yaml::Integer(8090)).unwrap().port(), 8090);
        assert_eq!(as_sockaddr(&yaml_str!("8090")).unwrap().port(), 8090);
        assert!(as_sockaddr(&yaml_str!("a.example:80")).is_err());
        assert!(as_sockaddr(&Yaml::Integer(70000)).is_err());
    }

    #[test]
    fn t_host_port() {
        assert_eq!(
            as_host_port(&yaml_str!("peer.example:8090")).unwrap(),
            ("peer.example".to_string(), 8090)
        );
        assert_eq!(
            as_host_port(&yaml_str!("[::1]:443")).unwrap(),
            ("::1".to_string(), 443)
        );
        assert!(as_host_port(&yaml_str!("peer.example")).is_err());
        assert!(as_host_port(&yaml_str!(":80")).is_err());
    }
}
