//! Public catalog handlers.

use axum::{
    Json,
    extract::{Path, State},
};
use tracing::instrument;

use ticket_booth_core::{EventId, EventWithTicketTypes, Merchandise};

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Active events with their active ticket types.
#[instrument(skip(state))]
pub async fn list_events(State(state): State<AppState>) -> Result<Json<Vec<EventWithTicketTypes>>> {
    let events = state.catalog().active_events().await?;
    Ok(Json(events.as_ref().clone()))
}

/// One active event.
#[instrument(skip(state))]
pub async fn show_event(
    State(state): State<AppState>,
    Path(id): Path<EventId>,
) -> Result<Json<EventWithTicketTypes>> {
    state
        .catalog()
        .active_event(id)
        .await?
        .map(|event| Json(event.as_ref().clone()))
        .ok_or_else(|| AppError::NotFound("Event".to_string()))
}

/// Active merchandise.
#[instrument(skip(state))]
pub async fn list_merchandise(State(state): State<AppState>) -> Result<Json<Vec<Merchandise>>> {
    let items = state.catalog().active_merchandise().await?;
    Ok(Json(items.as_ref().clone()))
}
