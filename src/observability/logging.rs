//! Structured logging.
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, human format for development
//! - `RUST_LOG` wins over the configured level

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Default filter directive when `RUST_LOG` is unset.
pub fn default_directive(level: &str) -> String {
    format!("api_mirror={level},tower_http={level}")
}

/// Whether to emit JSON lines.
pub fn use_json(config: &ObservabilityConfig, app_env: Option<&str>) -> bool {
    config.json_logs || app_env == Some("production")
}

/// Install the global tracing subscriber.
pub fn init_logging(config: &ObservabilityConfig) {
    let app_env = std::env::var("APP_ENV").ok();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_directive(&config.log_level).into());

    let subscriber = tracing_subscriber::registry().with(filter);

    if use_json(config, app_env.as_deref()) {
        subscriber.with(fmt::layer().json()).init();
    } else {
        subscriber.with(fmt::layer()).init();
    }
}
