//! Request ID middleware for request tracing and correlation.
//!
//! An `x-request-id` from an upstream proxy is reused when it looks sane;
//! otherwise a UUID v4 is generated. The ID is recorded in the current span,
//! tagged on the Sentry scope and echoed in the response headers.

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use tracing::Span;
use uuid::Uuid;

/// The HTTP header name for request IDs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest upstream request ID accepted as-is.
const MAX_REQUEST_ID_LEN: usize = 128;

fn upstream_request_id(request: &Request) -> Option<String> {
    request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|id| {
            !id.is_empty()
                && id.len() <= MAX_REQUEST_ID_LEN
                && id
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        })
        .map(str::to_owned)
}

/// Middleware that ensures every request has a request ID.
pub async fn request_id_middleware(request: Request, next: Next) -> Response {
    let request_id =
        upstream_request_id(&request).unwrap_or_else(|| Uuid::new_v4().to_string());

    Span::current().record("request_id", &request_id);
    sentry::configure_scope(|scope| {
        scope.set_tag("request_id", &request_id);
    });

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::{Router, body::Body, routing::get};
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(axum::middleware::from_fn(request_id_middleware))
    }

    async fn response_id(header: Option<&str>) -> String {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(REQUEST_ID_HEADER, value);
        }
        let response = app()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        response.headers()[REQUEST_ID_HEADER]
            .to_str()
            .unwrap()
            .to_owned()
    }

    #[tokio::test]
    async fn test_generates_request_id() {
        let id = response_id(None).await;
        assert!(Uuid::parse_str(&id).is_ok());
    }

    #[tokio::test]
    async fn test_reuses_upstream_request_id() {
        assert_eq!(response_id(Some("cf-8a1b2c3d")).await, "cf-8a1b2c3d");
    }

    #[tokio::test]
    async fn test_replaces_suspicious_request_id() {
        let id = response_id(Some("abc def<script>")).await;
        assert!(Uuid::parse_str(&id).is_ok());

        let long = "a".repeat(MAX_REQUEST_ID_LEN + 1);
        let id = response_id(Some(&long)).await;
        assert!(Uuid::parse_str(&id).is_ok());
    }
}
