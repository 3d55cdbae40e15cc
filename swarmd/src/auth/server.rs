/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use swarm_http::HttpBasicAuth;
use swarm_http::header::Header;

use crate::config::ServerAuthConfig;

/// Check the Authorization header of a request to a protected local path.
pub fn check_server_auth(config: &ServerAuthConfig, header: &Header) -> bool {
    let Some(value) = header.get(http::header::AUTHORIZATION.as_str()) else {
        return false;
    };
    match HttpBasicAuth::from_authorization(value) {
        Ok(Some(auth)) => {
            constant_time_eq::constant_time_eq(auth.username.as_bytes(), config.username.as_bytes())
                & constant_time_eq::constant_time_eq(
                    auth.password.as_bytes(),
                    config.password.as_bytes(),
                )
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ServerAuthConfig {
        ServerAuthConfig {
            username: "admin".to_string(),
            password: "pw".to_string(),
            paths: Vec::new(),
        }
    }

    #[test]
    fn basic() {
        let config = config();
        let mut h = Header::new();
        assert!(!check_server_auth(&config, &h));

        h.put(
            "Authorization",
            format!("Basic {}", HttpBasicAuth::new("admin", "pw").encoded_value()),
        );
        assert!(check_server_auth(&config, &h));

        h.put(
            "Authorization",
            format!("Basic {}", HttpBasicAuth::new("admin", "px").encoded_value()),
        );
        assert!(!check_server_auth(&config, &h));

        h.put("Authorization", "Bearer abc");
        assert!(!check_server_auth(&config, &h));
    }
}
