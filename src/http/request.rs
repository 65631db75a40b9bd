//! Inbound request helpers.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) for every inbound call
//! - Pick the JSON render mode requested by the caller
//! - Read small header values used when building a `ProxyRequest`

use axum::http::{HeaderMap, HeaderName, HeaderValue, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

use crate::forwarder::RenderMode;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Per-request override of the configured render mode (`pretty` | `compact`).
pub const X_MIRROR_RENDER: HeaderName = HeaderName::from_static("x-mirror-render");

/// Issues a fresh UUID v4 for requests that arrive without an `x-request-id`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuidV4;

impl MakeRequestId for MakeRequestUuidV4 {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let value = HeaderValue::from_str(&Uuid::new_v4().to_string()).ok()?;
        Some(RequestId::new(value))
    }
}

/// Header value as an owned string, if present and visible ASCII.
pub fn header_string(headers: &HeaderMap, name: impl AsRef<str>) -> Option<String> {
    headers
        .get(name.as_ref())
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

/// Render mode for this request; unknown values fall back to the default.
pub fn render_mode(headers: &HeaderMap, default: RenderMode) -> RenderMode {
    headers
        .get(&X_MIRROR_RENDER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
