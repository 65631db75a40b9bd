//! Response conversion.
//!
//! The forwarder produces a typed `ProxyResponse`; this is the only place it
//! becomes an HTTP response.

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

use crate::forwarder::{ProxyResponse, TEXT_CONTENT_TYPE};

impl IntoResponse for ProxyResponse {
    fn into_response(self) -> Response {
        let content_type = HeaderValue::from_str(&self.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static(TEXT_CONTENT_TYPE));

        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        response.headers_mut().insert(header::CONTENT_TYPE, content_type);
        response
    }
}

/// JSON 404 for paths outside `/api` and `/health`.
pub async fn not_found() -> ProxyResponse {
    ProxyResponse::error(StatusCode::NOT_FOUND, "Route not found")
}
