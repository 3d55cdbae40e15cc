/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use swarm_http::body::{HttpBodyReader, HttpBodyType};
use swarmd::config::SwarmConfig;
use swarmd::context::ServerContext;
use swarmd::serve::HttpServer;

pub fn test_config() -> SwarmConfig {
    let mut config = SwarmConfig::default();
    config.server.listen = "127.0.0.1:0".parse().unwrap();
    config.server.read_timeout = Duration::from_secs(5);
    config.proxy.upstream_read_timeout = Duration::from_secs(5);
    config.pool.connect_timeout = Duration::from_secs(2);
    config.cache.directory = std::env::temp_dir().join("swarmd-test-cache");
    config
}

pub async fn start_server(config: &SwarmConfig) -> (Arc<ServerContext>, SocketAddr) {
    let ctx = Arc::new(ServerContext::with_logger(config, None));
    let addr = start_with(Arc::clone(&ctx)).await;
    (ctx, addr)
}

pub async fn start_with(ctx: Arc<ServerContext>) -> SocketAddr {
    let server = HttpServer::bind(ctx).await.unwrap();
    let addr = server.local_addr();
    tokio::spawn(server.run(std::future::pending()));
    addr
}

pub struct TestClient {
    reader: BufReader<tokio::net::tcp::OwnedReadHalf>,
    writer: tokio::net::tcp::OwnedWriteHalf,
}

impl TestClient {
    pub async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (r, w) = stream.into_split();
        TestClient {
            reader: BufReader::new(r),
            writer: w,
        }
    }

    pub async fn send(&mut self, data: &[u8]) {
        self.writer.write_all(data).await.unwrap();
        self.writer.flush().await.unwrap();
    }

    pub async fn recv(&mut self) -> TestResponse {
        read_response(&mut self.reader, false).await
    }

    pub async fn recv_head(&mut self) -> TestResponse {
        read_response(&mut self.reader, true).await
    }

    pub async fn recv_raw(&mut self, len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; len];
        self.reader.read_exact(&mut buf).await.unwrap();
        buf
    }

    /// Whether the server closed the connection.
    pub async fn is_closed(&mut self) -> bool {
        let mut buf = [0u8; 1];
        matches!(
            tokio::time::timeout(Duration::from_secs(5), self.reader.read(&mut buf)).await,
            Ok(Ok(0)) | Ok(Err(_))
        )
    }
}

#[derive(Debug)]
pub struct TestResponse {
    pub status_line: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn status(&self) -> u16 {
        self.status_line
            .split(' ')
            .nth(1)
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body_str(&self) -> &str {
        std::str::from_utf8(&self.body).unwrap()
    }
}

async fn read_head<R>(reader: &mut R) -> Option<(String, Vec<(String, String)>)>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    if reader.read_line(&mut line).await.unwrap() == 0 {
        return None;
    }
    let first = line.trim_end().to_string();
    let mut headers = Vec::new();
    loop {
        line.clear();
        reader.read_line(&mut line).await.unwrap();
        let l = line.trim_end();
        if l.is_empty() {
            break;
        }
        let (k, v) = l.split_once(':').unwrap();
        headers.push((k.trim().to_string(), v.trim().to_string()));
    }
    Some((first, headers))
}

fn body_type(headers: &[(String, String)], default: Option<HttpBodyType>) -> Option<HttpBodyType> {
    let get = |name: &str| {
        headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    };
    if get("transfer-encoding").is_some() {
        return Some(HttpBodyType::Chunked);
    }
    match get("content-length") {
        Some(v) => Some(HttpBodyType::ContentLength(v.parse().unwrap())),
        None => default,
    }
}

pub async fn read_response<R>(reader: &mut R, head_only: bool) -> TestResponse
where
    R: AsyncBufRead + Unpin,
{
    let (status_line, headers) = read_head(reader).await.unwrap();
    let mut rsp = TestResponse {
        status_line,
        headers,
        body: Vec::new(),
    };
    if head_only {
        return rsp;
    }
    if let Some(body_type) = body_type(&rsp.headers, Some(HttpBodyType::ReadUntilEnd)) {
        let mut body_reader = HttpBodyReader::new(reader, body_type, 8192);
        body_reader.read_to_end(&mut rsp.body).await.unwrap();
    }
    rsp
}

/// A request as seen by the mock upstream.
#[derive(Clone, Debug)]
pub struct SeenRequest {
    pub line: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl SeenRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// An upstream answering with canned responses in order.
pub struct MockUpstream {
    pub addr: SocketAddr,
    pub accepted: Arc<AtomicUsize>,
    pub requests: Arc<Mutex<Vec<SeenRequest>>>,
}

impl MockUpstream {
    pub async fn start(responses: &[&str]) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let queue = Arc::new(Mutex::new(
            responses.iter().map(|s| s.to_string()).collect::<VecDeque<_>>(),
        ));

        let accepted2 = Arc::clone(&accepted);
        let requests2 = Arc::clone(&requests);
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                accepted2.fetch_add(1, Ordering::SeqCst);
                let requests = Arc::clone(&requests2);
                let queue = Arc::clone(&queue);
                tokio::spawn(async move {
                    let (r, mut w) = stream.into_split();
                    let mut r = BufReader::new(r);
                    while let Some((line, headers)) = read_head(&mut r).await {
                        let mut body = Vec::new();
                        if let Some(body_type) = body_type(&headers, None) {
                            let mut body_reader = HttpBodyReader::new(&mut r, body_type, 8192);
                            body_reader.read_to_end(&mut body).await.unwrap();
                        }
                        requests.lock().unwrap().push(SeenRequest {
                            line,
                            headers,
                            body,
                        });
                        let Some(rsp) = queue.lock().unwrap().pop_front() else {
                            break;
                        };
                        if w.write_all(rsp.as_bytes()).await.is_err() {
                            break;
                        }
                    }
                });
            }
        });

        MockUpstream {
            addr,
            accepted,
            requests,
        }
    }

    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<SeenRequest> {
        self.requests.lock().unwrap().clone()
    }
}
