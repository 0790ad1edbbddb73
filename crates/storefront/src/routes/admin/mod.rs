//! Admin API, nested under `/admin/api`.
//!
//! Every handler requires `Authorization: Bearer <ADMIN_API_TOKEN>` through the
//! [`RequireAdmin`] extractor.
//!
//! ```text
//! GET    /dashboard
//! GET    /events                 POST /events
//! GET    /events/{id}            PUT  /events/{id}        DELETE /events/{id}
//! POST   /events/{id}/active
//! (same shape for /ticket-types and /merchandise)
//! GET    /orders?status=&limit=
//! GET    /orders/{id}
//! POST   /orders/{id}/verify-payment
//! POST   /orders/{id}/complete
//! GET    /attendees?event_id=
//! PUT    /attendees/{id}         DELETE /attendees/{id}
//! POST   /attendees/{id}/check-in    DELETE /attendees/{id}/check-in
//! GET    /email-logs?limit=
//! ```

pub mod attendees;
pub mod catalog;
pub mod orders;

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::{get, post},
};
use serde::Deserialize;
use tracing::instrument;

use crate::db::{EmailLog, EmailLogRepository, OrderRepository, SalesSummary};
use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::state::AppState;

/// Default page size for admin lists.
const DEFAULT_LIMIT: i64 = 100;

/// Largest page size for admin lists.
const MAX_LIMIT: i64 = 500;

/// `?limit=` query parameter.
#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

impl LimitQuery {
    /// Requested limit clamped to `1..=MAX_LIMIT`.
    #[must_use]
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

/// Body of the `is_active` toggle endpoints.
#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub is_active: bool,
}

/// Create the admin routes router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/events", get(catalog::list_events).post(catalog::create_event))
        .route(
            "/events/{id}",
            get(catalog::show_event)
                .put(catalog::update_event)
                .delete(catalog::delete_event),
        )
        .route("/events/{id}/active", post(catalog::set_event_active))
        .route(
            "/ticket-types",
            get(catalog::list_ticket_types).post(catalog::create_ticket_type),
        )
        .route(
            "/ticket-types/{id}",
            get(catalog::show_ticket_type)
                .put(catalog::update_ticket_type)
                .delete(catalog::delete_ticket_type),
        )
        .route(
            "/ticket-types/{id}/active",
            post(catalog::set_ticket_type_active),
        )
        .route(
            "/merchandise",
            get(catalog::list_merchandise).post(catalog::create_merchandise),
        )
        .route(
            "/merchandise/{id}",
            get(catalog::show_merchandise)
                .put(catalog::update_merchandise)
                .delete(catalog::delete_merchandise),
        )
        .route(
            "/merchandise/{id}/active",
            post(catalog::set_merchandise_active),
        )
        .route("/orders", get(orders::list))
        .route("/orders/{id}", get(orders::show))
        .route("/orders/{id}/verify-payment", post(orders::verify_payment))
        .route("/orders/{id}/complete", post(orders::complete))
        .route("/attendees", get(attendees::list))
        .route(
            "/attendees/{id}",
            axum::routing::put(attendees::update).delete(attendees::delete),
        )
        .route(
            "/attendees/{id}/check-in",
            post(attendees::check_in).delete(attendees::undo_check_in),
        )
        .route("/email-logs", get(email_logs))
}

/// Order, revenue and attendance counters.
#[instrument(skip(state))]
pub async fn dashboard(
    _admin: RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<SalesSummary>> {
    let summary = OrderRepository::new(state.pool()).sales_summary().await?;
    Ok(Json(summary))
}

/// Most recent email delivery attempts.
#[instrument(skip(state))]
pub async fn email_logs(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<EmailLog>>> {
    let logs = EmailLogRepository::new(state.pool())
        .list_recent(query.limit())
        .await?;
    Ok(Json(logs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_query_clamps() {
        assert_eq!(LimitQuery::default().limit(), DEFAULT_LIMIT);
        assert_eq!(LimitQuery { limit: Some(0) }.limit(), 1);
        assert_eq!(LimitQuery { limit: Some(-5) }.limit(), 1);
        assert_eq!(LimitQuery { limit: Some(25) }.limit(), 25);
        assert_eq!(LimitQuery { limit: Some(10_000) }.limit(), MAX_LIMIT);
    }
}
