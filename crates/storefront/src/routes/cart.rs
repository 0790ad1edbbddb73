//! Cart route handlers.
//!
//! Every handler resolves the caller's cart token from the session. A cart ID
//! that belongs to another session answers `404`.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::instrument;

use ticket_booth_core::{Cart, CartId, CheckoutInput, Order};

use crate::error::{Result, add_breadcrumb};
use crate::middleware::CartSession;
use crate::routes::JsonBody;
use crate::services::AddItemRequest;
use crate::state::AppState;

/// Update quantity request body.
#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    /// New quantity; zero or less removes the line.
    pub quantity: i64,
}

/// Get or create the session's cart.
#[instrument(skip(state, session))]
pub async fn show(
    State(state): State<AppState>,
    CartSession(session): CartSession,
) -> Result<Json<Cart>> {
    let cart = state
        .commerce()
        .get_or_create_cart(&session, Utc::now())
        .await?;
    Ok(Json(cart))
}

/// Add an item to the cart.
#[instrument(skip(state, session, request))]
pub async fn add_item(
    State(state): State<AppState>,
    CartSession(session): CartSession,
    Path(cart_id): Path<CartId>,
    JsonBody(request): JsonBody<AddItemRequest>,
) -> Result<Json<Cart>> {
    add_breadcrumb(
        "cart",
        "Add item",
        &[
            ("item_type", request.item_type.to_string()),
            ("item_id", request.item_id.to_string()),
        ],
    );
    let cart = state
        .commerce()
        .add_item(&session, cart_id, request, Utc::now())
        .await?;
    Ok(Json(cart))
}

/// Set the quantity of a cart line.
#[instrument(skip(state, session))]
pub async fn update_item(
    State(state): State<AppState>,
    CartSession(session): CartSession,
    Path((cart_id, index)): Path<(CartId, usize)>,
    JsonBody(request): JsonBody<UpdateQuantityRequest>,
) -> Result<Json<Cart>> {
    let cart = state
        .commerce()
        .update_item_quantity(&session, cart_id, index, request.quantity, Utc::now())
        .await?;
    Ok(Json(cart))
}

/// Remove a cart line.
#[instrument(skip(state, session))]
pub async fn remove_item(
    State(state): State<AppState>,
    CartSession(session): CartSession,
    Path((cart_id, index)): Path<(CartId, usize)>,
) -> Result<Json<Cart>> {
    let cart = state
        .commerce()
        .remove_item(&session, cart_id, index, Utc::now())
        .await?;
    Ok(Json(cart))
}

/// Empty the cart.
#[instrument(skip(state, session))]
pub async fn clear(
    State(state): State<AppState>,
    CartSession(session): CartSession,
    Path(cart_id): Path<CartId>,
) -> Result<Json<Cart>> {
    let cart = state
        .commerce()
        .clear_cart(&session, cart_id, Utc::now())
        .await?;
    Ok(Json(cart))
}

/// Check the cart out into a pending order.
#[instrument(skip(state, session, input))]
pub async fn checkout(
    State(state): State<AppState>,
    CartSession(session): CartSession,
    Path(cart_id): Path<CartId>,
    JsonBody(input): JsonBody<CheckoutInput>,
) -> Result<(StatusCode, Json<Order>)> {
    let order = state
        .commerce()
        .checkout(&session, cart_id, input, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}
