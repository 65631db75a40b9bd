//! Forwarding failures and their client-visible shape.

use axum::http::StatusCode;
use thiserror::Error;

/// Everything that can go wrong while relaying one request.
#[derive(Debug, Error)]
pub enum ForwardError {
    /// The upstream exchange exceeded its budget.
    #[error("Upstream request timed out after {0}ms")]
    Timeout(u64),

    /// The upstream answered with a non-2xx status.
    #[error("API Error: {}", status_line(*.0))]
    UpstreamStatus(StatusCode),

    /// The body looked like JSON but did not parse.
    #[error("Invalid JSON response")]
    MalformedJson(#[source] serde_json::Error),

    /// DNS, connect or transport failure.
    #[error("Failed to reach upstream API")]
    Network(#[source] reqwest::Error),

    #[error("Invalid upstream URL: {0}")]
    InvalidUrl(String),
}

fn status_line(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    }
}

impl ForwardError {
    /// Status code returned to the caller.
    pub fn status(&self) -> StatusCode {
        match self {
            ForwardError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ForwardError::UpstreamStatus(status) => *status,
            ForwardError::MalformedJson(_) => StatusCode::BAD_GATEWAY,
            ForwardError::Network(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ForwardError::InvalidUrl(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ForwardError::Timeout(_) => "timeout",
            ForwardError::UpstreamStatus(_) => "upstream_status",
            ForwardError::MalformedJson(_) => "malformed_json",
            ForwardError::Network(_) => "network",
            ForwardError::InvalidUrl(_) => "invalid_url",
        }
    }
}
