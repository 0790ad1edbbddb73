//! Admin order handlers: listing, payment verification and completion on
//! behalf of a buyer.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::Utc;
use serde::Deserialize;
use tracing::instrument;

use ticket_booth_core::{Order, OrderId, PaymentStatus};

use super::LimitQuery;
use crate::db::{AttendeeRepository, OrderRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::routes::JsonBody;
use crate::routes::orders::{CompleteOrderRequest, OrderConfirmation};
use crate::services::notifications;
use crate::state::AppState;

/// `?status=&limit=` filter.
#[derive(Debug, Deserialize)]
pub struct OrderFilter {
    pub status: Option<PaymentStatus>,
    pub limit: Option<i64>,
}

/// Orders, newest first.
#[instrument(skip(state))]
pub async fn list(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Query(filter): Query<OrderFilter>,
) -> Result<Json<Vec<Order>>> {
    let orders = OrderRepository::new(state.pool())
        .list(filter.status, LimitQuery { limit: filter.limit }.limit())
        .await?;
    Ok(Json(orders))
}

/// One order with its attendees.
#[instrument(skip(state))]
pub async fn show(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderConfirmation>> {
    let order = OrderRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order".to_string()))?;
    let attendees = AttendeeRepository::new(state.pool())
        .list_for_order(order.id)
        .await?;
    Ok(Json(OrderConfirmation::new(order, attendees)))
}

/// Confirm the buyer's transaction reference was received.
#[instrument(skip(state))]
pub async fn verify_payment(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    let order = state.commerce().verify_payment(id, Utc::now()).await?;
    notifications::spawn_payment_verified(
        state.pool().clone(),
        state.email().cloned(),
        order.clone(),
    );
    Ok(Json(order))
}

/// Complete an order for a buyer who paid but could not submit the form.
#[instrument(skip(state, request))]
pub async fn complete(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    JsonBody(request): JsonBody<CompleteOrderRequest>,
) -> Result<Json<Order>> {
    let order = state
        .commerce()
        .complete_order(id, &request.payment_confirmation, Utc::now())
        .await?;
    state.catalog().invalidate_all().await;
    notifications::spawn_order_completed(
        state.pool().clone(),
        state.email().cloned(),
        order.clone(),
    );
    Ok(Json(order))
}
