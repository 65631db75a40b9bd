//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! HTTP layer and forwarder produce:
//!     → logging.rs (structured log events, request-scoped spans)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout (human or JSON lines)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - The `x-request-id` of each call is attached to its span and log lines
//! - Metrics are off by default; recording without a recorder costs nothing

pub mod logging;
pub mod metrics;
