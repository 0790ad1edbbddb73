//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers return `Result<T, AppError>`.
//! Error bodies are JSON: `{"error": "..."}`.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use ticket_booth_core::{
    AttendeeError, CartError, CatalogError, CheckoutError, NotificationError, OrderError,
    ValidationError,
};

use crate::db::RepositoryError;
use crate::services::{CommerceError, EmailError};

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// A cart, order or attendee workflow failed.
    #[error(transparent)]
    Commerce(#[from] CommerceError),

    /// The email provider rejected or failed a send.
    #[error("Email error: {0}")]
    Email(#[from] EmailError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing or invalid credentials.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request conflicts with current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// A required integration is not configured.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ValidationError> for AppError {
    fn from(e: ValidationError) -> Self {
        Self::BadRequest(e.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<NotificationError> for AppError {
    fn from(e: NotificationError) -> Self {
        match e {
            NotificationError::Template(_) => Self::Internal(e.to_string()),
            _ => Self::BadRequest(e.to_string()),
        }
    }
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Database(e) => repository_status(e),
            Self::Commerce(e) => commerce_status(e),
            Self::Email(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn public_message(&self, status: StatusCode) -> String {
        if status.is_server_error() {
            return match self {
                Self::Email(_) => "Failed to send email".to_owned(),
                Self::ServiceUnavailable(what) => format!("{what} is not available"),
                _ => "Internal server error".to_owned(),
            };
        }
        match self {
            Self::Database(RepositoryError::Conflict(message)) => message.clone(),
            Self::Commerce(CommerceError::Repository(RepositoryError::Conflict(message))) => {
                message.clone()
            }
            Self::Commerce(e) => e.to_string(),
            Self::NotFound(what) => format!("{what} not found"),
            Self::Unauthorized(message) | Self::BadRequest(message) | Self::Conflict(message) => {
                message.clone()
            }
            Self::RateLimited => "Too many requests".to_owned(),
            _ => self.to_string(),
        }
    }
}

fn repository_status(e: &RepositoryError) -> StatusCode {
    match e {
        RepositoryError::NotFound => StatusCode::NOT_FOUND,
        RepositoryError::Conflict(_) => StatusCode::CONFLICT,
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

const fn catalog_status(e: &CatalogError) -> StatusCode {
    match e {
        CatalogError::Inactive { .. } | CatalogError::InsufficientInventory { .. } => {
            StatusCode::CONFLICT
        }
        CatalogError::InvalidVariantSelection { .. } => StatusCode::BAD_REQUEST,
    }
}

const fn cart_status(e: &CartError) -> StatusCode {
    match e {
        CartError::NotActive | CartError::Expired => StatusCode::CONFLICT,
        CartError::ItemIndexOutOfRange { .. } => StatusCode::NOT_FOUND,
        CartError::InvalidQuantity(_) => StatusCode::BAD_REQUEST,
        CartError::Catalog(e) => catalog_status(e),
    }
}

fn commerce_status(e: &CommerceError) -> StatusCode {
    match e {
        CommerceError::Repository(e) => repository_status(e),
        CommerceError::Cart(e) => cart_status(e),
        CommerceError::Catalog(e) => catalog_status(e),
        CommerceError::Checkout(CheckoutError::Cart(e)) => cart_status(e),
        CommerceError::Checkout(_)
        | CommerceError::Order(OrderError::InvalidConfirmation)
        | CommerceError::Attendee(
            AttendeeError::TicketTypeNotInOrder(_)
            | AttendeeError::MissingField(_)
            | AttendeeError::InvalidEmail(_),
        ) => StatusCode::BAD_REQUEST,
        CommerceError::Order(_) | CommerceError::Attendee(_) => StatusCode::CONFLICT,
        CommerceError::CartNotFound
        | CommerceError::OrderNotFound
        | CommerceError::ItemNotFound(_)
        | CommerceError::AttendeeNotFound => StatusCode::NOT_FOUND,
        CommerceError::TicketCodeExhausted => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() && !matches!(self, Self::ServiceUnavailable(_)) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        // Don't expose internal error details to clients
        let message = self.public_message(status);

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Add a breadcrumb for a buyer or staff action.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: &[(&str, String)]) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_owned()),
        message: Some(message.to_owned()),
        level: sentry::Level::Info,
        ..Default::default()
    };
    for (key, value) in data {
        breadcrumb
            .data
            .insert((*key).to_owned(), serde_json::Value::String(value.clone()));
    }
    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    fn get_status(err: impl Into<AppError>) -> StatusCode {
        err.into().into_response().status()
    }

    async fn body_json(err: AppError) -> serde_json::Value {
        let response = err.into_response();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("event".to_string());
        assert_eq!(err.to_string(), "Not found: event");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(get_status(AppError::RateLimited), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            get_status(AppError::ServiceUnavailable("Email".to_string())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            get_status(EmailError::Api {
                status: 422,
                message: "bad".to_string()
            }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_commerce_error_status_codes() {
        assert_eq!(get_status(CommerceError::CartNotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            get_status(CommerceError::Order(OrderError::AlreadyCompleted)),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(CommerceError::Order(OrderError::InvalidConfirmation)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(CommerceError::Checkout(CheckoutError::EmptyCart)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(CommerceError::Checkout(CheckoutError::Cart(CartError::NotActive))),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(CommerceError::Cart(CartError::InvalidQuantity(4_000_000_000))),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(CommerceError::Catalog(CatalogError::InsufficientInventory {
                name: "General Admission".to_string(),
                requested: 3,
                available: 1,
            })),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(CommerceError::Cart(CartError::Catalog(
                CatalogError::InvalidVariantSelection {
                    name: "Festival Shirt".to_string(),
                    reason: "Size is required".to_string(),
                }
            ))),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(CommerceError::Attendee(AttendeeError::NoTicketsRemaining {
                purchased: 2
            })),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(CommerceError::Attendee(AttendeeError::MissingField("first_name"))),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(RepositoryError::Conflict("in use".to_string())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(ValidationError::Negative("price")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(NotificationError::NoRecipients),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(NotificationError::Template(askama::Error::from(std::fmt::Error))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_error_body_is_json() {
        let body = body_json(CommerceError::Order(OrderError::AlreadyCompleted).into()).await;
        assert_eq!(body["error"], "order has already been completed");

        let body = body_json(RepositoryError::Conflict("event is still referenced".into()).into())
            .await;
        assert_eq!(body["error"], "event is still referenced");
    }

    #[tokio::test]
    async fn test_internal_details_hidden() {
        let body = body_json(AppError::Internal("connection refused at 10.0.0.5".into())).await;
        assert_eq!(body["error"], "Internal server error");

        let body = body_json(
            EmailError::Api {
                status: 401,
                message: "invalid key re_123".to_string(),
            }
            .into(),
        )
        .await;
        assert_eq!(body["error"], "Failed to send email");
    }
}
