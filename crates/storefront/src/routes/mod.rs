//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                               - Liveness
//! GET    /health/ready                         - Readiness (database ping)
//!
//! # Catalog
//! GET    /api/events                           - Active events with ticket types
//! GET    /api/events/{id}                      - One active event
//! GET    /api/merchandise                      - Active merchandise
//!
//! # Cart (session-bound)
//! GET    /api/cart                             - Get or create the session's cart
//! POST   /api/carts/{cart_id}/items            - Add item
//! PATCH  /api/carts/{cart_id}/items/{index}    - Update quantity
//! DELETE /api/carts/{cart_id}/items/{index}    - Remove item
//! DELETE /api/carts/{cart_id}/items            - Clear cart
//! POST   /api/carts/{cart_id}/checkout         - Checkout into an order
//!
//! # Orders
//! GET    /api/orders/{reference}               - Confirmation (order + attendees)
//! POST   /api/orders/{reference}/complete      - Submit payment confirmation
//! GET    /api/orders/{reference}/attendees     - List attendees
//! POST   /api/orders/{reference}/attendees     - Register attendee
//!
//! # Email
//! POST   /api/email/send-email-confirmation    - Send a transactional email
//!
//! # Admin (bearer token)
//! /admin/api/...                               - See [`admin`]
//! ```

pub mod admin;
pub mod cart;
pub mod catalog;
pub mod email;
pub mod orders;

use axum::{
    Router,
    extract::{FromRequest, State},
    http::{Request, StatusCode},
    routing::{get, patch, post},
};
use tower_http::trace::TraceLayer;

use crate::error::AppError;
use crate::middleware::{
    REQUEST_ID_HEADER, api_rate_limiter, create_session_layer, email_rate_limiter,
    request_id_middleware,
};
use crate::state::AppState;

/// JSON body extractor whose rejections become `400 {"error"}` responses.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

/// Create the catalog routes router.
pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/events", get(catalog::list_events))
        .route("/events/{id}", get(catalog::show_event))
        .route("/merchandise", get(catalog::list_merchandise))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/cart", get(cart::show))
        .route(
            "/carts/{cart_id}/items",
            post(cart::add_item).delete(cart::clear),
        )
        .route(
            "/carts/{cart_id}/items/{index}",
            patch(cart::update_item).delete(cart::remove_item),
        )
        .route("/carts/{cart_id}/checkout", post(cart::checkout))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/orders/{reference}", get(orders::show))
        .route("/orders/{reference}/complete", post(orders::complete))
        .route(
            "/orders/{reference}/attendees",
            get(orders::list_attendees).post(orders::add_attendee),
        )
}

/// Create the email routes router (stricter rate limit).
pub fn email_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/email/send-email-confirmation",
            post(email::send_email_confirmation),
        )
        .layer(email_rate_limiter())
}

/// Create the public API router.
pub fn api_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(catalog_routes())
        .merge(cart_routes())
        .merge(order_routes())
        .merge(email_routes())
        .layer(api_rate_limiter())
        .layer(create_session_layer(state.pool(), state.config()))
}

/// Build the complete application router.
pub fn app(state: AppState) -> Router {
    let trace_layer = TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = tracing::field::Empty,
        )
    });

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/api", api_routes(&state))
        .nest("/admin/api", admin::routes())
        .with_state(state)
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(trace_layer)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use crate::config::tests::{TEST_ADMIN_TOKEN, test_config};

    fn test_app() -> Router {
        let config = test_config();
        // Never connects unless a handler touches the database
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/ticket_booth_test")
            .unwrap();
        app(AppState::new(config, pool).unwrap())
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn email_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/email/send-email-confirmation")
            .header(CONTENT_TYPE, "application/json")
            .header("x-forwarded-for", "203.0.113.9")
            .body(Body::from(body.to_owned()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = test_app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
    }

    #[tokio::test]
    async fn test_admin_requires_token() {
        let response = test_app()
            .oneshot(
                Request::get("/admin/api/orders")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(json_body(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_admin_rejects_wrong_token() {
        let wrong = TEST_ADMIN_TOKEN.replace('a', "b");
        let response = test_app()
            .oneshot(
                Request::get("/admin/api/dashboard")
                    .header(AUTHORIZATION, format!("Bearer {wrong}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_email_without_recipients_is_bad_request() {
        let response = test_app()
            .oneshot(email_request(r#"{"orderId": "abc", "emailType": "orderConfirmation"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await["error"],
            "at least one recipient is required"
        );
    }

    #[tokio::test]
    async fn test_email_with_invalid_recipient_is_bad_request() {
        let response = test_app()
            .oneshot(email_request(r#"{"to": "not-an-address"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_email_malformed_json_is_bad_request() {
        let response = test_app()
            .oneshot(email_request("{not json"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_email_route_has_strict_rate_limit() {
        let app = test_app();
        for _ in 0..5 {
            let response = app
                .clone()
                .oneshot(email_request(r#"{"emailType": "orderConfirmation"}"#))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }
        let response = app
            .oneshot(email_request(r#"{"emailType": "orderConfirmation"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_email_unconfigured_is_service_unavailable() {
        let response = test_app()
            .oneshot(email_request(
                r#"{"customerEmail": "buyer@example.com", "orderId": "abc"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json_body(response).await["error"], "Email is not available");
    }
}
