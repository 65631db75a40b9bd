//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, CORS)
//! - Turn inbound `/api/*` calls into `ProxyRequest`s for the forwarder
//! - Serve until the shutdown signal fires

use std::error::Error as _;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderName, HeaderValue, Method, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Router,
};
use http_body_util::LengthLimitError;
use thiserror::Error;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::{CorsConfig, MirrorConfig};
use crate::forwarder::url::api_path;
use crate::forwarder::{carries_body, is_forwardable, Forwarder, ProxyRequest, ProxyResponse, RenderMode};
use crate::http::health::get_health;
use crate::http::request::{header_string, render_mode, MakeRequestUuidV4, X_MIRROR_RENDER, X_REQUEST_ID};
use crate::http::response::not_found;
use crate::lifecycle::ShutdownSignal;
use crate::observability::metrics;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to build upstream client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub forwarder: Forwarder,
    pub render: RenderMode,
    pub max_body_size: usize,
    pub service_name: Arc<str>,
}

/// HTTP server for the API mirror.
pub struct HttpServer {
    router: Router,
    config: MirrorConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: MirrorConfig) -> Result<Self, ServerError> {
        let forwarder = Forwarder::new(&config.upstream, &config.timeouts)?;

        let state = AppState {
            forwarder,
            render: config.upstream.render,
            max_body_size: config.listener.max_body_size,
            service_name: Arc::from(config.observability.service_name.as_str()),
        };

        let router = Self::build_router(&config, state);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &MirrorConfig, state: AppState) -> Router {
        let mut router = Router::new()
            .route("/health", get(get_health))
            .route("/api", any(api_handler))
            .route("/api/", any(api_handler))
            .route("/api/{*rest}", any(api_handler))
            .fallback(not_found)
            .with_state(state);

        if config.cors.enabled {
            router = router.layer(cors_layer(&config.cors));
        }

        router.layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV4))
                .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                    let request_id = request
                        .headers()
                        .get(X_REQUEST_ID)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("unknown");
                    tracing::info_span!(
                        "request",
                        method = %request.method(),
                        path = %request.uri().path(),
                        request_id = %request_id,
                    )
                }))
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, shutdown: ShutdownSignal) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.base_url,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown.recv())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &MirrorConfig {
        &self.config
    }
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins = if config.allowed_origins.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(
            config
                .allowed_origins
                .iter()
                .filter_map(|origin| HeaderValue::from_str(origin).ok()),
        )
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, X_MIRROR_RENDER])
        .expose_headers([HeaderName::from_static(X_REQUEST_ID)])
}

/// Relay an `/api/*` call to the upstream.
async fn api_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let method = request.method().clone();

    let Some(path) = api_path(request.uri().path()).map(str::to_owned) else {
        return not_found().await.into_response();
    };

    if !is_forwardable(&method) {
        metrics::record_request(method.as_str(), 405, "rejected", start_time);
        return ProxyResponse::error(
            StatusCode::METHOD_NOT_ALLOWED,
            format!("Method {} is not supported", method),
        )
        .into_response();
    }

    let headers = request.headers();
    let query = request.uri().query().map(str::to_owned);
    let request_id = header_string(headers, X_REQUEST_ID);
    let content_type = header_string(headers, header::CONTENT_TYPE);
    let render = render_mode(headers, state.render);

    let body = if carries_body(&method) {
        match axum::body::to_bytes(request.into_body(), state.max_body_size).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::warn!(request_id = request_id.as_deref().unwrap_or("unknown"), error = %e, "Rejected request body");
                let response = if exceeds_limit(&e) {
                    ProxyResponse::error(
                        StatusCode::PAYLOAD_TOO_LARGE,
                        format!("Request body exceeds {} bytes", state.max_body_size),
                    )
                } else {
                    ProxyResponse::error(StatusCode::BAD_REQUEST, "Failed to read request body")
                };
                metrics::record_request(method.as_str(), response.status.as_u16(), "rejected", start_time);
                return response.into_response();
            }
        }
    } else {
        None
    };

    let proxy_request = ProxyRequest {
        path,
        query,
        method: method.clone(),
        content_type,
        body,
        request_id,
    };

    let response = state.forwarder.forward(proxy_request, render).await;

    let outcome = if response.error { "error" } else { "ok" };
    metrics::record_request(method.as_str(), response.status.as_u16(), outcome, start_time);

    response.into_response()
}

/// True when a body read failed because it ran past the size limit.
fn exceeds_limit(err: &axum::Error) -> bool {
    let mut source = err.source();
    while let Some(cause) = source {
        if cause.is::<LengthLimitError>() {
            return true;
        }
        source = cause.source();
    }
    false
}
