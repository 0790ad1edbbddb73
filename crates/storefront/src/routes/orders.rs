//! Buyer-facing order handlers: confirmation, payment submission and
//! attendee registration.
//!
//! Orders are addressed by their public UUID reference.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use ticket_booth_core::{Attendee, AttendeeInput, Order};

use crate::error::{Result, add_breadcrumb};
use crate::routes::JsonBody;
use crate::services::notifications;
use crate::state::AppState;

/// Payment confirmation submitted by the buyer.
#[derive(Debug, Deserialize)]
pub struct CompleteOrderRequest {
    /// Transaction ID from PayPal or Zelle.
    pub payment_confirmation: String,
}

/// Confirmation page data.
#[derive(Debug, Serialize)]
pub struct OrderConfirmation {
    pub order: Order,
    pub attendees: Vec<Attendee>,
    /// Ticket units still waiting for an attendee.
    pub attendees_remaining: u32,
}

impl OrderConfirmation {
    pub(crate) fn new(order: Order, attendees: Vec<Attendee>) -> Self {
        let registered = u32::try_from(attendees.len()).unwrap_or(u32::MAX);
        let attendees_remaining = order.ticket_count().saturating_sub(registered);
        Self {
            order,
            attendees,
            attendees_remaining,
        }
    }
}

/// Order confirmation with attendees.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(reference): Path<Uuid>,
) -> Result<Json<OrderConfirmation>> {
    let (order, attendees) = state.commerce().order_with_attendees(reference).await?;
    Ok(Json(OrderConfirmation::new(order, attendees)))
}

/// Record the buyer's payment confirmation and apply inventory.
///
/// Confirmation emails go out in the background after commit.
#[instrument(skip(state, request))]
pub async fn complete(
    State(state): State<AppState>,
    Path(reference): Path<Uuid>,
    JsonBody(request): JsonBody<CompleteOrderRequest>,
) -> Result<Json<Order>> {
    add_breadcrumb("order", "Complete order", &[("order", reference.to_string())]);
    let order = state
        .commerce()
        .complete_order_by_reference(reference, &request.payment_confirmation, Utc::now())
        .await?;

    state.catalog().invalidate_all().await;
    notifications::spawn_order_completed(
        state.pool().clone(),
        state.email().cloned(),
        order.clone(),
    );

    Ok(Json(order))
}

/// Attendees registered on an order.
#[instrument(skip(state))]
pub async fn list_attendees(
    State(state): State<AppState>,
    Path(reference): Path<Uuid>,
) -> Result<Json<Vec<Attendee>>> {
    let (_, attendees) = state.commerce().order_with_attendees(reference).await?;
    Ok(Json(attendees))
}

/// Register one ticket holder.
#[instrument(skip(state, input))]
pub async fn add_attendee(
    State(state): State<AppState>,
    Path(reference): Path<Uuid>,
    JsonBody(input): JsonBody<AttendeeInput>,
) -> Result<(StatusCode, Json<Attendee>)> {
    let attendee = state.commerce().add_attendee(reference, input).await?;
    Ok((StatusCode::CREATED, Json(attendee)))
}
