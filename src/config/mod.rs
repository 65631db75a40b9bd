//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! .env (dotenvy, optional)
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize, environment overrides)
//!     → validation.rs (semantic checks)
//!     → MirrorConfig (validated, immutable)
//!     → handed to the HTTP server and forwarder at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults so the mirror runs with no file at all
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    CorsConfig, ListenerConfig, MirrorConfig, ObservabilityConfig, TimeoutConfig, UpstreamConfig,
};
pub use validation::ValidationError;
