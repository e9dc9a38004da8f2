//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use openapi_cop::config::{MockConfig, ProxyConfig};
use openapi_cop::lifecycle::{self, Running};

/// A request as seen by a mock backend.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub head: String,
    pub body: Vec<u8>,
}

/// A canned backend response.
#[derive(Debug, Clone)]
pub struct Canned {
    pub status: u16,
    pub headers: Vec<(&'static str, String)>,
    pub body: Vec<u8>,
    /// Send the head and half the body, then hang.
    pub stall: bool,
}

impl Canned {
    pub fn json(status: u16, body: &str) -> Self {
        Self::bytes(status, body.as_bytes().to_vec())
    }

    /// JSON content type over arbitrary (e.g. compressed) bytes.
    pub fn bytes(status: u16, body: Vec<u8>) -> Self {
        Self {
            status,
            headers: vec![("Content-Type", "application/json".to_string())],
            body,
            stall: false,
        }
    }

    pub fn header(mut self, name: &'static str, value: &str) -> Self {
        self.headers.push((name, value.to_string()));
        self
    }

    pub fn stalled(mut self) -> Self {
        self.stall = true;
        self
    }
}

pub fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

/// A port nothing listens on.
pub async fn unused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Start a raw-TCP backend answering every request through `f`.
pub async fn start_programmable_backend<F>(f: F) -> SocketAddr
where
    F: Fn(Recorded) -> Canned + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let Some(request) = read_request(&mut socket).await else { return };
                        let canned = f(request);

                        let mut response = format!("HTTP/1.1 {} {}\r\n", canned.status, reason(canned.status));
                        for (name, value) in &canned.headers {
                            response.push_str(&format!("{}: {}\r\n", name, value));
                        }
                        response.push_str(&format!(
                            "Content-Length: {}\r\nConnection: close\r\n\r\n",
                            canned.body.len()
                        ));
                        let _ = socket.write_all(response.as_bytes()).await;
                        if canned.stall {
                            let _ = socket.write_all(&canned.body[..canned.body.len() / 2]).await;
                            tokio::time::sleep(Duration::from_secs(60)).await;
                            return;
                        }
                        let _ = socket.write_all(&canned.body).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });
    addr
}

/// Start a backend that always answers with `canned`.
pub async fn start_mock_backend(canned: Canned) -> SocketAddr {
    start_programmable_backend(move |_| canned.clone()).await
}

async fn read_request(socket: &mut TcpStream) -> Option<Recorded> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let head_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
    let length = head
        .lines()
        .filter_map(|l| l.split_once(':'))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.trim().parse::<usize>().ok())
        .unwrap_or(0);
    while buf.len() < head_end + length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    Some(Recorded {
        head,
        body: buf[head_end..].to_vec(),
    })
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        400 => "Bad Request",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

/// Proxy config on an ephemeral local port.
pub fn proxy_config(document: &Path, target: &str) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.host = "127.0.0.1".to_string();
    config.listener.port = 0;
    config.document.path = document.to_path_buf();
    config.target.url = target.to_string();
    config.target.timeout_secs = 5;
    config
}

pub async fn start_proxy(config: ProxyConfig) -> Running {
    lifecycle::start_proxy(config).await.expect("proxy failed to start")
}

pub async fn start_mock(document: &Path) -> Running {
    let mut config = MockConfig::default();
    config.listener.host = "127.0.0.1".to_string();
    config.listener.port = 0;
    config.document.path = document.to_path_buf();
    lifecycle::start_mock(config).await.expect("mock failed to start")
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

pub fn url(running: &Running, path: &str) -> String {
    format!("http://{}{}", running.local_addr(), path)
}
