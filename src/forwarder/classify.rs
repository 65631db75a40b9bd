//! Upstream body classification and normalization.

use axum::http::StatusCode;
use serde_json::Value;

use crate::forwarder::error::ForwardError;
use crate::forwarder::{ProxyResponse, RenderMode, JSON_CONTENT_TYPE, TEXT_CONTENT_TYPE};

/// A body is a JSON candidate when the upstream declares JSON or the
/// trimmed text opens like a JSON object or array.
pub fn is_json_candidate(content_type: Option<&str>, body: &str) -> bool {
    let declared = content_type
        .map(|ct| ct.to_ascii_lowercase().contains("application/json"))
        .unwrap_or(false);

    declared || matches!(body.trim_start().as_bytes().first(), Some(b'{') | Some(b'['))
}

/// Turn a successful upstream reply into a `ProxyResponse`.
///
/// JSON candidates are parsed and re-serialized; everything else passes
/// through with the upstream content type. An empty (or blank) body is
/// relayed as empty whatever the content type claims, e.g. 204 No Content.
pub fn normalize(
    status: StatusCode,
    content_type: Option<&str>,
    body: String,
    render: RenderMode,
) -> Result<ProxyResponse, ForwardError> {
    if body.trim().is_empty() {
        return Ok(ProxyResponse {
            status,
            content_type: passthrough_type(content_type).to_string(),
            body: String::new(),
            error: false,
        });
    }

    if is_json_candidate(content_type, &body) {
        let value: Value = serde_json::from_str(&body).map_err(ForwardError::MalformedJson)?;
        return Ok(ProxyResponse {
            status,
            content_type: JSON_CONTENT_TYPE.to_string(),
            body: render.render(&value),
            error: false,
        });
    }

    Ok(ProxyResponse {
        status,
        content_type: passthrough_type(content_type).to_string(),
        body,
        error: false,
    })
}

fn passthrough_type(content_type: Option<&str>) -> &str {
    content_type
        .filter(|ct| !ct.trim().is_empty())
        .unwrap_or(TEXT_CONTENT_TYPE)
}
