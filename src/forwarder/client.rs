//! The upstream call itself.

use std::time::Duration;

use axum::http::header::{ACCEPT, CONTENT_TYPE};
use tokio::time;

use crate::config::{TimeoutConfig, UpstreamConfig};
use crate::forwarder::classify::normalize;
use crate::forwarder::error::ForwardError;
use crate::forwarder::url::{has_dot_segment, redact_query, upstream_url, within_base};
use crate::forwarder::{carries_body, ProxyRequest, ProxyResponse, RenderMode, ACCEPT_VALUE, JSON_CONTENT_TYPE};

/// Relays requests to a single upstream base URL.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: reqwest::Client,
    base_url: String,
    /// Parsed base; `None` only if the configured URL is unparseable.
    base: Option<reqwest::Url>,
    timeout: Duration,
}

impl Forwarder {
    pub fn new(upstream: &UpstreamConfig, timeouts: &TimeoutConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(upstream.user_agent.clone())
            .connect_timeout(Duration::from_millis(timeouts.connect_ms))
            .build()?;

        let base_url = upstream.base_url.trim_end_matches('/').to_string();
        Ok(Self {
            client,
            base: reqwest::Url::parse(&base_url).ok(),
            base_url,
            timeout: Duration::from_millis(timeouts.request_ms),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Forward one request and normalize the reply.
    ///
    /// Never fails: every error is folded into a structured `ProxyResponse`.
    /// Dropping the returned future aborts the upstream call.
    pub async fn forward(&self, request: ProxyRequest, render: RenderMode) -> ProxyResponse {
        let request_id = request.request_id.clone().unwrap_or_default();

        match self.try_forward(request, render).await {
            Ok(response) => response,
            Err(err) => {
                match &err {
                    ForwardError::UpstreamStatus(status) => {
                        tracing::info!(request_id = %request_id, status = %status, "Upstream returned error status");
                    }
                    ForwardError::Network(source) => {
                        tracing::error!(request_id = %request_id, error = %source, "Upstream unreachable");
                    }
                    ForwardError::MalformedJson(source) => {
                        tracing::warn!(request_id = %request_id, error = %source, "Upstream sent invalid JSON");
                    }
                    other => {
                        tracing::warn!(request_id = %request_id, kind = other.kind(), error = %other, "Forwarding failed");
                    }
                }
                ProxyResponse::from(err)
            }
        }
    }

    async fn try_forward(&self, request: ProxyRequest, render: RenderMode) -> Result<ProxyResponse, ForwardError> {
        if has_dot_segment(&request.path) {
            return Err(ForwardError::InvalidUrl("path must not contain '.' or '..' segments".into()));
        }

        let target = upstream_url(&self.base_url, &request.path, request.query.as_deref());
        let url = reqwest::Url::parse(&target).map_err(|e| ForwardError::InvalidUrl(e.to_string()))?;
        if !self.base.as_ref().is_some_and(|base| within_base(base, &url)) {
            return Err(ForwardError::InvalidUrl("path leaves the upstream base".into()));
        }

        tracing::debug!(
            request_id = request.request_id.as_deref().unwrap_or("unknown"),
            method = %request.method,
            url = %redact_query(&target),
            "Forwarding to upstream"
        );

        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .header(ACCEPT, ACCEPT_VALUE);

        if let Some(id) = &request.request_id {
            builder = builder.header("x-request-id", id.as_str());
        }

        if carries_body(&request.method) {
            if let Some(body) = request.body.filter(|b| !b.is_empty()) {
                let content_type = request.content_type.as_deref().unwrap_or(JSON_CONTENT_TYPE);
                builder = builder.header(CONTENT_TYPE, content_type).body(body);
            }
        }

        let exchange = async {
            let response = builder.send().await.map_err(ForwardError::Network)?;
            let status = response.status();
            if !status.is_success() {
                return Err(ForwardError::UpstreamStatus(status));
            }

            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned);
            let text = response.text().await.map_err(ForwardError::Network)?;
            Ok((status, content_type, text))
        };

        let (status, content_type, text) = time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| ForwardError::Timeout(self.timeout.as_millis() as u64))??;

        normalize(status, content_type.as_deref(), text, render)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::RawQuery,
        http::{HeaderMap, Method, StatusCode, Uri},
        response::IntoResponse,
        routing::{any, get},
        Json, Router,
    };
    use bytes::Bytes;
    use serde_json::{json, Value};
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};
    use std::time::Instant;

    async fn echo(method: Method, RawQuery(query): RawQuery, headers: HeaderMap, body: String) -> Json<Value> {
        let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_owned);
        Json(json!({
            "method": method.as_str(),
            "query": query,
            "accept": header("accept"),
            "content_type": header("content-type"),
            "request_id": header("x-request-id"),
            "body": body,
        }))
    }

    async fn start_upstream() -> SocketAddr {
        let app = Router::new()
            .route(
                "/movies",
                get(|| async {
                    (
                        [(CONTENT_TYPE, "application/json")],
                        r#"{"results":[{"id":1,"name":"Scream"}],"total":1}"#,
                    )
                }),
            )
            .route("/missing", get(|| async { (StatusCode::NOT_FOUND, "Not Found") }))
            .route(
                "/broken",
                get(|| async { ([(CONTENT_TYPE, "application/json")], "{\"results\": [") }),
            )
            .route("/text", get(|| async { "just text" }))
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(3)).await;
                    "late".into_response()
                }),
            )
            .route("/echo", any(echo));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn forwarder(addr: SocketAddr, request_ms: u64) -> Forwarder {
        let upstream = UpstreamConfig {
            base_url: format!("http://{}/", addr),
            ..Default::default()
        };
        let timeouts = TimeoutConfig {
            request_ms,
            ..Default::default()
        };
        Forwarder::new(&upstream, &timeouts).unwrap()
    }

    #[tokio::test]
    async fn test_json_scenario() {
        let addr = start_upstream().await;
        let fwd = forwarder(addr, 5_000);

        let response = fwd.forward(ProxyRequest::get("movies", None), RenderMode::Pretty).await;

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.content_type, "application/json");
        assert!(!response.error);
        let body: Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(body, json!({"results": [{"id": 1, "name": "Scream"}], "total": 1}));
    }

    #[tokio::test]
    async fn test_repeated_get_is_byte_identical() {
        let addr = start_upstream().await;
        let fwd = forwarder(addr, 5_000);

        let first = fwd.forward(ProxyRequest::get("movies", Some("page=1")), RenderMode::Compact).await;
        let second = fwd.forward(ProxyRequest::get("movies", Some("page=1")), RenderMode::Compact).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_upstream_404() {
        let addr = start_upstream().await;
        let fwd = forwarder(addr, 5_000);

        let response = fwd.forward(ProxyRequest::get("missing", None), RenderMode::Pretty).await;

        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert!(response.error);
        let body: Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(body["error"], true);
        assert_eq!(body["message"], "API Error: 404 Not Found");
    }

    #[tokio::test]
    async fn test_malformed_json() {
        let addr = start_upstream().await;
        let fwd = forwarder(addr, 5_000);

        let response = fwd.forward(ProxyRequest::get("broken", None), RenderMode::Pretty).await;

        assert_eq!(response.status, StatusCode::BAD_GATEWAY);
        let body: Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(body["message"], "Invalid JSON response");
    }

    #[tokio::test]
    async fn test_text_passthrough() {
        let addr = start_upstream().await;
        let fwd = forwarder(addr, 5_000);

        let response = fwd.forward(ProxyRequest::get("text", None), RenderMode::Pretty).await;

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body, "just text");
        assert!(response.content_type.starts_with("text/plain"));
    }

    #[tokio::test]
    async fn test_timeout_is_bounded() {
        let addr = start_upstream().await;
        let fwd = forwarder(addr, 300);

        let started = Instant::now();
        let response = fwd.forward(ProxyRequest::get("slow", None), RenderMode::Pretty).await;

        assert_eq!(response.status, StatusCode::GATEWAY_TIMEOUT);
        assert!(started.elapsed() < Duration::from_secs(2));
        let body: Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(body["message"], "Upstream request timed out after 300ms");
    }

    #[tokio::test]
    async fn test_network_failure() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let response = forwarder(addr, 5_000)
            .forward(ProxyRequest::get("movies", None), RenderMode::Pretty)
            .await;

        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.error);
    }

    #[tokio::test]
    async fn test_get_sends_accept_and_query_verbatim() {
        let addr = start_upstream().await;
        let fwd = forwarder(addr, 5_000);

        let mut request = ProxyRequest::get("echo", Some("token=abc&genre=drama&q=a%20b"));
        request.request_id = Some("req-1".into());
        let response = fwd.forward(request, RenderMode::Compact).await;

        let body: Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(body["method"], "GET");
        assert_eq!(body["query"], "token=abc&genre=drama&q=a%20b");
        assert_eq!(body["accept"], ACCEPT_VALUE);
        assert_eq!(body["request_id"], "req-1");
        assert_eq!(body["content_type"], Value::Null);
    }

    #[tokio::test]
    async fn test_missing_query_sends_none() {
        let addr = start_upstream().await;
        let response = forwarder(addr, 5_000)
            .forward(ProxyRequest::get("echo", None), RenderMode::Compact)
            .await;

        let body: Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(body["query"], Value::Null);
    }

    #[tokio::test]
    async fn test_post_body_defaults_to_json_content_type() {
        let addr = start_upstream().await;
        let fwd = forwarder(addr, 5_000);

        let request = ProxyRequest {
            method: Method::POST,
            body: Some(Bytes::from_static(br#"{"title":"Scream"}"#)),
            ..ProxyRequest::get("echo", None)
        };
        let response = fwd.forward(request, RenderMode::Compact).await;

        let body: Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(body["method"], "POST");
        assert_eq!(body["content_type"], "application/json");
        assert_eq!(body["body"], r#"{"title":"Scream"}"#);
    }

    #[tokio::test]
    async fn test_put_keeps_caller_content_type() {
        let addr = start_upstream().await;
        let fwd = forwarder(addr, 5_000);

        let request = ProxyRequest {
            method: Method::PUT,
            content_type: Some("text/plain".into()),
            body: Some(Bytes::from_static(b"hello")),
            ..ProxyRequest::get("echo", None)
        };
        let response = fwd.forward(request, RenderMode::Compact).await;

        let body: Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(body["method"], "PUT");
        assert_eq!(body["content_type"], "text/plain");
        assert_eq!(body["body"], "hello");
    }

    #[tokio::test]
    async fn test_delete_body_is_not_forwarded() {
        let addr = start_upstream().await;
        let fwd = forwarder(addr, 5_000);

        let request = ProxyRequest {
            method: Method::DELETE,
            body: Some(Bytes::from_static(b"ignored")),
            ..ProxyRequest::get("echo", None)
        };
        let response = fwd.forward(request, RenderMode::Compact).await;

        let body: Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(body["method"], "DELETE");
        assert_eq!(body["body"], "");
    }

    /// Upstream that answers every request with the URI it received.
    async fn start_uri_recorder() -> (SocketAddr, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorded = seen.clone();
        let app = Router::new().fallback(move |uri: Uri| {
            let recorded = recorded.clone();
            async move {
                recorded.lock().unwrap().push(uri.to_string());
                Json(json!({ "uri": uri.to_string() }))
            }
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (addr, seen)
    }

    fn forwarder_under(addr: SocketAddr, base_path: &str) -> Forwarder {
        let upstream = UpstreamConfig {
            base_url: format!("http://{}{}", addr, base_path),
            ..Default::default()
        };
        Forwarder::new(&upstream, &TimeoutConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_dot_segments_cannot_leave_base_path() {
        let (addr, seen) = start_uri_recorder().await;
        let fwd = forwarder_under(addr, "/v1");

        for path in ["../admin", "list/../../admin", "%2e%2e/admin", "./list"] {
            let response = fwd.forward(ProxyRequest::get(path, None), RenderMode::Compact).await;
            assert_eq!(response.status, StatusCode::BAD_REQUEST, "path {}", path);
            assert!(response.error);
        }
        assert!(seen.lock().unwrap().is_empty(), "upstream must not be contacted");

        let response = fwd.forward(ProxyRequest::get("list", Some("page=2")), RenderMode::Compact).await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(seen.lock().unwrap().as_slice(), ["/v1/list?page=2"]);
    }

    #[tokio::test]
    async fn test_upstream_sees_parser_encoding() {
        let (addr, seen) = start_uri_recorder().await;
        let fwd = forwarder_under(addr, "/v1");

        let response = fwd
            .forward(
                ProxyRequest::get("search/{x}", Some("name=O'Brien&q=a%20b")),
                RenderMode::Compact,
            )
            .await;

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(
            seen.lock().unwrap().as_slice(),
            ["/v1/search/%7Bx%7D?name=O%27Brien&q=a%20b"]
        );
    }
}
