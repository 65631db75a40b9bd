//! Configuration validation.
//!
//! Serde handles syntax; this module checks values. Validation is a pure
//! function that returns every problem found, not just the first.

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::MirrorConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address '{0}' is not a socket address")]
    BindAddress(String),

    #[error("listener.max_body_size must be greater than zero")]
    ZeroBodyLimit,

    #[error("upstream.base_url '{0}' must be an absolute http(s) URL")]
    UpstreamUrl(String),

    #[error("upstream.base_url '{0}' must not carry a query or fragment")]
    UpstreamUrlSuffix(String),

    #[error("timeouts.{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("observability.metrics_address '{0}' is not a socket address")]
    MetricsAddress(String),
}

/// Validate a configuration, collecting all errors.
pub fn validate_config(config: &MirrorConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }
    if config.listener.max_body_size == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }

    match Url::parse(&config.upstream.base_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {
            if url.query().is_some() || url.fragment().is_some() {
                errors.push(ValidationError::UpstreamUrlSuffix(config.upstream.base_url.clone()));
            }
        }
        _ => errors.push(ValidationError::UpstreamUrl(config.upstream.base_url.clone())),
    }

    if config.timeouts.request_ms == 0 {
        errors.push(ValidationError::ZeroTimeout("request_ms"));
    }
    if config.timeouts.connect_ms == 0 {
        errors.push(ValidationError::ZeroTimeout("connect_ms"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
