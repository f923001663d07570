//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use property_managing::config::{CircuitBreakerConfig, RetryConfig, ServiceConfig};
use property_managing::{HttpServer, Shutdown};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

pub const TOKEN: &str = "caller-jwt";

/// A running service instance; shut down on drop.
pub struct TestServer {
    pub base_url: String,
    pub client: reqwest::Client,
    shutdown: Shutdown,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET with the test bearer token.
    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(TOKEN)
            .send()
            .await
            .unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Config pointing at local fakes, with retry delays short enough for tests.
pub fn test_config(store_url: &str, users_url: &str) -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.store.url = store_url.to_string();
    config.store.api_key = "anon-key".to_string();
    config.store.timeout_ms = 500;
    config.users.base_url = users_url.to_string();
    config.users.timeout_ms = 500;
    config.retries = RetryConfig {
        max_attempts: 3,
        base_delay_ms: 10,
        max_delay_ms: 30,
        jitter: false,
    };
    config.circuit_breaker = CircuitBreakerConfig {
        fail_max: 2,
        reset_timeout_secs: 30,
    };
    config
}

/// Start the service on an ephemeral port.
pub async fn spawn_server(config: ServiceConfig) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = HttpServer::new(config).unwrap();
    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        server.run(listener, rx).await.unwrap();
    });

    let client = reqwest::Client::builder().no_proxy().build().unwrap();

    TestServer {
        base_url: format!("http://{}", addr),
        client,
        shutdown,
    }
}

/// Start a programmable backend that answers every request with `f()`.
///
/// Returns the base URL. Each connection serves exactly one request.
pub async fn start_programmable_backend<F, Fut>(f: F) -> String
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        if read_request(&mut socket).await.is_err() {
                            return;
                        }

                        let (status, body) = f().await;
                        let status_text = match status {
                            200 => "200 OK",
                            201 => "201 Created",
                            400 => "400 Bad Request",
                            404 => "404 Not Found",
                            429 => "429 Too Many Requests",
                            500 => "500 Internal Server Error",
                            502 => "502 Bad Gateway",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    format!("http://{}", addr)
}

/// Read the request head and any Content-Length body.
async fn read_request(socket: &mut tokio::net::TcpStream) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];

    let head_end = loop {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_ascii_lowercase();
    let content_length = head
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < head_end + content_length {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    Ok(())
}

/// A stored row as PostgREST returns it.
pub fn row(id: &str, user_id: &str) -> Value {
    json!({
        "id": id,
        "name": "Loft",
        "description": "Sunny loft",
        "price": 1200.0,
        "latitude": 52.52,
        "longitude": 13.40,
        "user_id": user_id,
        "image": "loft.png",
        "type": "apartment",
        "location": "Berlin",
        "size": 80,
        "created_at": "2024-01-01T00:00:00Z"
    })
}

/// A create request body.
pub fn listing(user_id: &str) -> Value {
    let mut body = row("ignored", user_id);
    let fields = body.as_object_mut().unwrap();
    fields.remove("id");
    fields.remove("created_at");
    body
}
