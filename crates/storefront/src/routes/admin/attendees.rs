//! Admin attendee handlers: listing, contact edits and door check-in.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use tracing::instrument;

use ticket_booth_core::{Attendee, AttendeeId, AttendeeUpdate};

use super::catalog::EventFilter;
use crate::db::AttendeeRepository;
use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::routes::JsonBody;
use crate::state::AppState;

/// Attendees, optionally for one event.
#[instrument(skip(state))]
pub async fn list(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Query(filter): Query<EventFilter>,
) -> Result<Json<Vec<Attendee>>> {
    let attendees = AttendeeRepository::new(state.pool())
        .list(filter.event_id)
        .await?;
    Ok(Json(attendees))
}

/// Update an attendee's name and contact details.
#[instrument(skip(state, update))]
pub async fn update(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<AttendeeId>,
    JsonBody(update): JsonBody<AttendeeUpdate>,
) -> Result<Json<Attendee>> {
    let changes = update.validate()?;
    let attendee = AttendeeRepository::new(state.pool())
        .update_contact(id, &changes)
        .await?;
    Ok(Json(attendee))
}

/// Remove an attendee; the ticket unit becomes available for registration.
#[instrument(skip(state))]
pub async fn delete(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<AttendeeId>,
) -> Result<StatusCode> {
    AttendeeRepository::new(state.pool()).delete(id).await?;
    tracing::info!(attendee_id = %id, "Attendee deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn check_in(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<AttendeeId>,
) -> Result<Json<Attendee>> {
    Ok(Json(state.commerce().check_in(id, Utc::now()).await?))
}

#[instrument(skip(state))]
pub async fn undo_check_in(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<AttendeeId>,
) -> Result<Json<Attendee>> {
    Ok(Json(state.commerce().undo_check_in(id).await?))
}
