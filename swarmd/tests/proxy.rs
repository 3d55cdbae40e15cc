/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use swarm_http::HttpBasicAuth;
use swarmd::config::{PeerHopConfig, ProxyUserConfig};

mod common;
use common::{MockUpstream, TestClient, start_server, test_config};

const CHUNKED_HELLO: &str =
    "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n0\r\n\r\n";

const CACHEABLE_PAGE: &str = "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: 4\r\nCache-Control: max-age=600\r\nLast-Modified: Sun, 06 Nov 1994 08:49:37 GMT\r\n\r\npage";

fn get(upstream: &MockUpstream, path: &str, extra: &str) -> String {
    format!(
        "GET http://{addr}{path} HTTP/1.1\r\nHost: {addr}\r\n{extra}\r\n",
        addr = upstream.addr
    )
}

#[tokio::test]
async fn forward_chunked_and_reuse() {
    let upstream = MockUpstream::start(&[CHUNKED_HELLO, CHUNKED_HELLO]).await;
    let mut config = test_config();
    config.cache.enabled = false;
    let (ctx, addr) = start_server(&config).await;

    let mut client = TestClient::connect(addr).await;
    client
        .send(get(&upstream, "/a?x=1", "Proxy-Connection: keep-alive\r\n").as_bytes())
        .await;
    let rsp = client.recv().await;
    assert_eq!(rsp.status(), 200);
    assert_eq!(rsp.header("transfer-encoding"), Some("chunked"));
    assert_eq!(rsp.body_str(), "hello");
    assert!(rsp.header("via").unwrap().ends_with("swarmd"));

    client.send(get(&upstream, "/b", "").as_bytes()).await;
    let rsp = client.recv().await;
    assert_eq!(rsp.body_str(), "hello");

    let seen = upstream.requests();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].line, "GET /a?x=1 HTTP/1.1");
    assert_eq!(seen[0].header("x-forwarded-for"), Some("127.0.0.1"));
    assert!(seen[0].header("proxy-connection").is_none());
    assert!(seen[0].header("client-addr").is_none());
    assert_eq!(seen[1].line, "GET /b HTTP/1.1");
    assert_eq!(upstream.accepted(), 1);
    assert_eq!(ctx.pool().idle_count(), 1);
}

#[tokio::test]
async fn forward_http10_client() {
    let upstream = MockUpstream::start(&[CHUNKED_HELLO]).await;
    let mut config = test_config();
    config.cache.enabled = false;
    let (_ctx, addr) = start_server(&config).await;

    let mut client = TestClient::connect(addr).await;
    client
        .send(format!("GET http://{}/ HTTP/1.0\r\n\r\n", upstream.addr).as_bytes())
        .await;
    let rsp = client.recv().await;
    assert!(rsp.status_line.starts_with("HTTP/1.0 200"));
    assert!(rsp.header("transfer-encoding").is_none());
    assert_eq!(rsp.header("connection"), Some("close"));
    assert_eq!(rsp.body_str(), "hello");
}

#[tokio::test]
async fn forward_post_body() {
    let upstream = MockUpstream::start(&[
        "HTTP/1.1 201 Created\r\nContent-Length: 2\r\n\r\nok",
        "HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n",
    ])
    .await;
    let (_ctx, addr) = start_server(&test_config()).await;

    let mut client = TestClient::connect(addr).await;
    client
        .send(
            format!(
                "POST http://{addr}/submit HTTP/1.1\r\nHost: {addr}\r\nTransfer-Encoding: chunked\r\n\r\n4\r\ndata\r\n0\r\n\r\n",
                addr = upstream.addr
            )
            .as_bytes(),
        )
        .await;
    let rsp = client.recv().await;
    assert_eq!(rsp.status(), 201);
    assert_eq!(rsp.body_str(), "ok");

    client
        .send(
            format!(
                "POST http://{addr}/submit HTTP/1.1\r\nHost: {addr}\r\nContent-Length: 3\r\n\r\nabc",
                addr = upstream.addr
            )
            .as_bytes(),
        )
        .await;
    let rsp = client.recv().await;
    assert_eq!(rsp.status(), 200);

    let seen = upstream.requests();
    assert_eq!(seen[0].header("transfer-encoding"), Some("chunked"));
    assert_eq!(seen[0].body, b"data");
    assert_eq!(seen[1].header("content-length"), Some("3"));
    assert_eq!(seen[1].body, b"abc");
}

#[tokio::test]
async fn cache_hit_and_not_modified() {
    let upstream = MockUpstream::start(&[CACHEABLE_PAGE]).await;
    let (ctx, addr) = start_server(&test_config()).await;

    let mut client = TestClient::connect(addr).await;
    client.send(get(&upstream, "/page.html", "").as_bytes()).await;
    let rsp = client.recv().await;
    assert_eq!(rsp.status(), 200);
    assert_eq!(rsp.body_str(), "page");
    assert_eq!(ctx.cache().store().len(), 1);

    client
        .send(
            get(
                &upstream,
                "/page.html",
                "If-Modified-Since: Sun, 06 Nov 1994 08:49:37 GMT\r\n",
            )
            .as_bytes(),
        )
        .await;
    let rsp = client.recv_head().await;
    assert_eq!(rsp.status(), 304);

    client.send(get(&upstream, "/page.html", "").as_bytes()).await;
    let rsp = client.recv().await;
    assert_eq!(rsp.status(), 200);
    assert_eq!(rsp.body_str(), "page");
    assert_eq!(rsp.header("cache-control"), Some("max-age=600"));

    assert_eq!(upstream.requests().len(), 1);
}

const CACHEABLE_CHUNKED: &str = "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nTransfer-Encoding: chunked\r\nCache-Control: max-age=600\r\n\r\n5\r\nhello\r\n5\r\nworld\r\n0\r\n\r\n";

#[tokio::test]
async fn cache_skips_oversized_body() {
    let upstream = MockUpstream::start(&[CACHEABLE_CHUNKED, CACHEABLE_CHUNKED]).await;
    let mut config = test_config();
    config.cache.max_object_size = 8;
    let (ctx, addr) = start_server(&config).await;

    let mut client = TestClient::connect(addr).await;
    for _ in 0..2 {
        client.send(get(&upstream, "/big.html", "").as_bytes()).await;
        let rsp = client.recv().await;
        assert_eq!(rsp.status(), 200);
        assert_eq!(rsp.body_str(), "helloworld");
    }
    assert_eq!(ctx.cache().store().len(), 0);
    assert_eq!(upstream.requests().len(), 2);
}

#[tokio::test]
async fn upstream_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let target = listener.local_addr().unwrap();
    drop(listener);

    let (_ctx, addr) = start_server(&test_config()).await;
    let mut client = TestClient::connect(addr).await;
    client
        .send(format!("GET http://{target}/ HTTP/1.1\r\nHost: {target}\r\n\r\n").as_bytes())
        .await;
    let rsp = client.recv().await;
    assert_eq!(rsp.status(), 502);
}

#[tokio::test]
async fn proxy_auth_required() {
    let upstream = MockUpstream::start(&[CHUNKED_HELLO]).await;
    let mut config = test_config();
    config.proxy.users = vec![ProxyUserConfig {
        username: "alice".to_string(),
        password: "wonderland".to_string(),
        time_limit: None,
    }];
    let (_ctx, addr) = start_server(&config).await;

    let mut client = TestClient::connect(addr).await;
    client.send(get(&upstream, "/", "").as_bytes()).await;
    let rsp = client.recv().await;
    assert_eq!(rsp.status(), 407);
    assert!(rsp.header("proxy-authenticate").unwrap().starts_with("Basic"));
    assert!(client.is_closed().await);

    let value = HttpBasicAuth::new("alice", "wonderland").encoded_value();
    let mut client = TestClient::connect(addr).await;
    client
        .send(get(&upstream, "/", &format!("Proxy-Authorization: Basic {value}\r\n")).as_bytes())
        .await;
    let rsp = client.recv().await;
    assert_eq!(rsp.status(), 200);
    assert!(upstream.requests()[0].header("proxy-authorization").is_none());
}

#[tokio::test]
async fn proxy_disabled() {
    let mut config = test_config();
    config.proxy.enabled = false;
    let (_ctx, addr) = start_server(&config).await;

    let mut client = TestClient::connect(addr).await;
    client
        .send(b"GET http://192.0.2.1/ HTTP/1.1\r\nHost: 192.0.2.1\r\n\r\n")
        .await;
    let rsp = client.recv().await;
    assert_eq!(rsp.status(), 403);
}

#[tokio::test]
async fn peer_hop_rate_limit() {
    let upstream = MockUpstream::start(&[CHUNKED_HELLO, CHUNKED_HELLO]).await;
    let mut config = test_config();
    config.cache.enabled = false;
    config.proxy.peer_hop = Some(PeerHopConfig {
        network_secret: "net-key".to_string(),
        requester_rate: 1,
        target_rate: 100,
        window: Duration::from_secs(60),
    });
    let (_ctx, addr) = start_server(&config).await;

    let hop = "X-Peer-Hop: peer-a\r\nX-Peer-Key: net-key\r\n";
    let mut client = TestClient::connect(addr).await;
    client.send(get(&upstream, "/", hop).as_bytes()).await;
    let rsp = client.recv().await;
    assert_eq!(rsp.status(), 200);
    let seen = upstream.requests();
    assert!(seen[0].header("x-peer-key").is_none());

    client.send(get(&upstream, "/", hop).as_bytes()).await;
    let rsp = client.recv().await;
    assert_eq!(rsp.status(), 429);

    let mut client = TestClient::connect(addr).await;
    client
        .send(get(&upstream, "/", "X-Peer-Hop: peer-b\r\nX-Peer-Key: wrong\r\n").as_bytes())
        .await;
    let rsp = client.recv().await;
    assert_eq!(rsp.status(), 403);
}

#[tokio::test]
async fn connect_tunnel() {
    let echo = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let target = echo.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut stream, _) = echo.accept().await.unwrap();
        let mut buf = [0u8; 64];
        loop {
            let n = stream.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            stream.write_all(&buf[..n]).await.unwrap();
        }
    });

    let mut config = test_config();
    config.server.connect_only_443 = false;
    let (_ctx, addr) = start_server(&config).await;

    let mut client = TestClient::connect(addr).await;
    client
        .send(format!("CONNECT {target} HTTP/1.1\r\nHost: {target}\r\n\r\n").as_bytes())
        .await;
    let rsp = client.recv_head().await;
    assert_eq!(rsp.status_line, "HTTP/1.1 200 Connection established");

    client.send(b"ping").await;
    assert_eq!(client.recv_raw(4).await, b"ping");
}

#[tokio::test]
async fn connect_port_denied() {
    let (_ctx, addr) = start_server(&test_config()).await;
    let mut client = TestClient::connect(addr).await;
    client
        .send(b"CONNECT 127.0.0.1:22 HTTP/1.1\r\nHost: 127.0.0.1:22\r\n\r\n")
        .await;
    let rsp = client.recv().await;
    assert_eq!(rsp.status(), 403);
    assert!(client.is_closed().await);
}
