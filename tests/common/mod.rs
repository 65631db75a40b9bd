//! Shared utilities for integration testing.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use api_mirror::config::MirrorConfig;
use api_mirror::http::HttpServer;
use api_mirror::lifecycle::Shutdown;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// What the mock upstream sends back.
#[derive(Debug, Clone)]
pub struct MockReply {
    pub status: u16,
    pub content_type: Option<&'static str>,
    pub body: String,
    pub delay: Duration,
}

impl MockReply {
    pub fn json(body: &str) -> Self {
        Self {
            status: 200,
            content_type: Some("application/json"),
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn text(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: Some("text/plain"),
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }
}

/// Raw requests (request line, headers and any `Content-Length` body) seen
/// by the mock upstream.
pub type SeenRequests = Arc<Mutex<Vec<String>>>;

/// Start a programmable upstream on an ephemeral port.
///
/// `f` receives the request target (path and query) and decides the reply.
pub async fn start_programmable_upstream<F, Fut>(f: F) -> (SocketAddr, SeenRequests)
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = MockReply> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen: SeenRequests = Arc::new(Mutex::new(Vec::new()));
    let f = Arc::new(f);

    let seen_by_server = seen.clone();
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    let seen = seen_by_server.clone();
                    tokio::spawn(async move {
                        let head = read_request(&mut socket).await;
                        let target = head
                            .lines()
                            .next()
                            .and_then(|line| line.split(' ').nth(1))
                            .unwrap_or("/")
                            .to_string();
                        seen.lock().unwrap().push(head);

                        let reply = f(target).await;
                        tokio::time::sleep(reply.delay).await;

                        let content_type = reply
                            .content_type
                            .map(|ct| format!("Content-Type: {}\r\n", ct))
                            .unwrap_or_default();
                        let response = format!(
                            "HTTP/1.1 {} {}\r\n{}Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                            reply.status,
                            reason(reply.status),
                            content_type,
                            reply.body.len(),
                            reply.body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    (addr, seen)
}

/// Upstream that always sends the same reply.
#[allow(dead_code)]
pub async fn start_fixed_upstream(reply: MockReply) -> (SocketAddr, SeenRequests) {
    start_programmable_upstream(move |_| {
        let reply = reply.clone();
        async move { reply }
    })
    .await
}

/// Start the mirror in front of `upstream`, letting the test adjust config.
pub async fn start_mirror<F>(upstream: SocketAddr, tweak: F) -> (SocketAddr, Shutdown)
where
    F: FnOnce(&mut MirrorConfig),
{
    let mut config = MirrorConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.upstream.base_url = format!("http://{}", upstream);
    tweak(&mut config);

    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config).unwrap();
    let signal = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, signal).await;
    });

    (addr, shutdown)
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return String::from_utf8_lossy(&buf).into_owned(),
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    };

    let content_length = String::from_utf8_lossy(&buf[..head_end])
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < head_end + content_length {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}
