//! API mirror: a pass-through proxy for a movie-metadata API.

pub mod config;
pub mod forwarder;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod util;

pub use config::MirrorConfig;
pub use forwarder::{Forwarder, ProxyRequest, ProxyResponse, RenderMode};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
