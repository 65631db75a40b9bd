//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, routing)
//!     → request.rs (request ID, render mode, header extraction)
//!     → forwarder (upstream call + normalization)
//!     → response.rs (ProxyResponse → HTTP response)
//!     → Send to client
//!
//! GET /health → health.rs (never touches the upstream)
//! ```

pub mod health;
pub mod request;
pub mod response;
pub mod server;

pub use request::{MakeRequestUuidV4, X_MIRROR_RENDER, X_REQUEST_ID};
pub use server::{AppState, HttpServer, ServerError};
