/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use http::Method;

use swarm_http::HttpVersion;
use swarm_http::body::HttpBodyType;

use super::request::HttpRequest;

/// Whether the connection may carry another request after this one.
pub fn decide_keep_alive(keep_alive_enabled: bool, req: &HttpRequest) -> bool {
    if !keep_alive_enabled {
        return false;
    }
    let keep_alive = match req.version {
        HttpVersion::Http09 | HttpVersion::Http10 => false,
        HttpVersion::Http11 => !req.header.header().connection_close(),
    };
    if !keep_alive {
        return false;
    }

    // the end of an unframed POST body is the end of the connection
    if req.method == Method::POST
        && req.header.header().content_length() < 0
        && req.body_type != Some(HttpBodyType::Chunked)
    {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarm_http::header::Header;

    fn request(line: &[u8], headers: &[(&str, &str)]) -> HttpRequest {
        let mut req = HttpRequest::parse_line(line).unwrap();
        let mut h = Header::new();
        for (k, v) in headers {
            h.add(k, *v);
        }
        req.set_header(h).unwrap();
        req
    }

    #[test]
    fn table() {
        let host = ("Host", "a.example");

        let req = request(b"GET / HTTP/1.0\r\n", &[("Connection", "keep-alive")]);
        assert!(!decide_keep_alive(true, &req));

        let req = request(b"GET / HTTP/1.1\r\n", &[host]);
        assert!(decide_keep_alive(true, &req));
        assert!(!decide_keep_alive(false, &req));

        let req = request(b"GET / HTTP/1.1\r\n", &[host, ("Connection", "Close")]);
        assert!(!decide_keep_alive(true, &req));

        let req = request(b"GET / HTTP/1.1\r\n", &[host, ("Proxy-Connection", "close")]);
        assert!(!decide_keep_alive(true, &req));

        let req = request(b"GET /\r\n", &[]);
        assert!(!decide_keep_alive(true, &req));
    }

    #[test]
    fn post_framing() {
        let host = ("Host", "a.example");

        let req = request(
            b"POST /submit HTTP/1.1\r\n",
            &[host, ("Connection", "keep-alive")],
        );
        assert!(!decide_keep_alive(true, &req));

        let req = request(b"POST /submit HTTP/1.1\r\n", &[host, ("Content-Length", "0")]);
        assert!(decide_keep_alive(true, &req));

        let req = request(
            b"POST /submit HTTP/1.1\r\n",
            &[host, ("Transfer-Encoding", "chunked")],
        );
        assert!(decide_keep_alive(true, &req));

        let req = request(b"PUT /submit HTTP/1.1\r\n", &[host]);
        assert!(decide_keep_alive(true, &req));
    }
}
