//! Upstream forwarding subsystem.
//!
//! # Data Flow
//! ```text
//! ProxyRequest (path, raw query, method, optional body)
//!     → url.rs (splice onto the upstream base, no re-encoding)
//!     → client.rs (single upstream call under a hard timeout)
//!     → classify.rs (JSON candidate? parse + re-serialize : pass through)
//!     → ProxyResponse (status, content type, body)
//!
//! Any failure along the way:
//!     → error.rs (ForwardError)
//!     → ProxyResponse with a JSON error body
//! ```
//!
//! # Design Decisions
//! - The forwarder never returns an error; failures become responses
//! - Upstream bodies are read as text and only then parsed
//! - No retries: one attempt per inbound call

pub mod classify;
pub mod client;
pub mod error;
pub mod url;

use std::str::FromStr;

use axum::http::{Method, StatusCode};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

pub use client::Forwarder;
pub use error::ForwardError;

/// Accept header sent on every upstream request.
pub const ACCEPT_VALUE: &str = "application/json, text/plain, */*";
/// Content type of normalized JSON bodies and error bodies.
pub const JSON_CONTENT_TYPE: &str = "application/json";
/// Content type used when the upstream sent text without declaring one.
pub const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// How JSON bodies are re-serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    #[default]
    Pretty,
    Compact,
}

impl RenderMode {
    pub fn render(self, value: &serde_json::Value) -> String {
        match self {
            RenderMode::Pretty => format!("{:#}", value),
            RenderMode::Compact => value.to_string(),
        }
    }
}

impl FromStr for RenderMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(RenderMode::Pretty),
            "compact" => Ok(RenderMode::Compact),
            other => Err(format!("unknown render mode '{}'", other)),
        }
    }
}

/// One inbound call, reduced to what the upstream needs.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    /// Segment after the `/api/` prefix, raw.
    pub path: String,
    /// Raw query string without the leading `?`.
    pub query: Option<String>,
    pub method: Method,
    /// Caller's Content-Type, forwarded with write bodies.
    pub content_type: Option<String>,
    pub body: Option<Bytes>,
    /// Correlation ID propagated as `x-request-id`.
    pub request_id: Option<String>,
}

impl ProxyRequest {
    /// A bodiless GET.
    pub fn get(path: impl Into<String>, query: Option<&str>) -> Self {
        Self {
            path: path.into(),
            query: query.map(str::to_owned),
            method: Method::GET,
            content_type: None,
            body: None,
            request_id: None,
        }
    }
}

/// The normalized reply handed back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub content_type: String,
    pub body: String,
    /// Set when the body is a structured error rather than upstream content.
    pub error: bool,
}

impl ProxyResponse {
    /// Build a structured `{"error": true, ...}` response.
    pub fn error(status: StatusCode, message: impl Into<String>) -> Self {
        let body = serde_json::json!({
            "error": true,
            "message": message.into(),
            "timestamp": crate::util::timestamp(),
        });

        Self {
            status,
            content_type: JSON_CONTENT_TYPE.to_string(),
            body: body.to_string(),
            error: true,
        }
    }
}

impl From<ForwardError> for ProxyResponse {
    fn from(err: ForwardError) -> Self {
        ProxyResponse::error(err.status(), err.to_string())
    }
}

/// Methods the mirror relays to the upstream.
pub fn is_forwardable(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

/// Methods whose body is forwarded.
pub fn carries_body(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}
