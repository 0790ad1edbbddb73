//! Admin catalog CRUD: events, ticket types and merchandise.
//!
//! Every write drops the public catalog cache.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::instrument;

use ticket_booth_core::{
    Event, EventId, EventInput, Merchandise, MerchandiseId, MerchandiseInput, TicketType,
    TicketTypeId, TicketTypeInput,
};

use super::SetActiveRequest;
use crate::db::CatalogRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::routes::JsonBody;
use crate::state::AppState;

/// `?event_id=` filter.
#[derive(Debug, Deserialize)]
pub struct EventFilter {
    pub event_id: Option<EventId>,
}

async fn ensure_event_exists(state: &AppState, id: EventId) -> Result<()> {
    if CatalogRepository::new(state.pool())
        .get_event(id)
        .await?
        .is_none()
    {
        return Err(AppError::BadRequest(format!("event {id} does not exist")));
    }
    Ok(())
}

// =============================================================================
// Events
// =============================================================================

#[instrument(skip(state))]
pub async fn list_events(
    _admin: RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<Vec<Event>>> {
    Ok(Json(CatalogRepository::new(state.pool()).list_events().await?))
}

#[instrument(skip(state))]
pub async fn show_event(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<EventId>,
) -> Result<Json<Event>> {
    CatalogRepository::new(state.pool())
        .get_event(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Event".to_string()))
}

#[instrument(skip(state, input))]
pub async fn create_event(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    JsonBody(input): JsonBody<EventInput>,
) -> Result<(StatusCode, Json<Event>)> {
    let input = input.validate()?;
    let event = CatalogRepository::new(state.pool())
        .create_event(&input)
        .await?;
    state.catalog().invalidate_all().await;
    tracing::info!(event_id = %event.id, "Event created");
    Ok((StatusCode::CREATED, Json(event)))
}

#[instrument(skip(state, input))]
pub async fn update_event(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<EventId>,
    JsonBody(input): JsonBody<EventInput>,
) -> Result<Json<Event>> {
    let input = input.validate()?;
    let event = CatalogRepository::new(state.pool())
        .update_event(id, &input)
        .await?;
    state.catalog().invalidate_all().await;
    Ok(Json(event))
}

#[instrument(skip(state))]
pub async fn set_event_active(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<EventId>,
    JsonBody(request): JsonBody<SetActiveRequest>,
) -> Result<Json<Event>> {
    let event = CatalogRepository::new(state.pool())
        .set_event_active(id, request.is_active)
        .await?;
    state.catalog().invalidate_all().await;
    Ok(Json(event))
}

#[instrument(skip(state))]
pub async fn delete_event(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<EventId>,
) -> Result<StatusCode> {
    CatalogRepository::new(state.pool()).delete_event(id).await?;
    state.catalog().invalidate_all().await;
    tracing::info!(event_id = %id, "Event deleted");
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Ticket types
// =============================================================================

#[instrument(skip(state))]
pub async fn list_ticket_types(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Query(filter): Query<EventFilter>,
) -> Result<Json<Vec<TicketType>>> {
    let ticket_types = CatalogRepository::new(state.pool())
        .list_ticket_types(filter.event_id)
        .await?;
    Ok(Json(ticket_types))
}

#[instrument(skip(state))]
pub async fn show_ticket_type(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<TicketTypeId>,
) -> Result<Json<TicketType>> {
    CatalogRepository::new(state.pool())
        .get_ticket_type(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Ticket type".to_string()))
}

#[instrument(skip(state, input))]
pub async fn create_ticket_type(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    JsonBody(input): JsonBody<TicketTypeInput>,
) -> Result<(StatusCode, Json<TicketType>)> {
    let input = input.validate()?;
    ensure_event_exists(&state, input.event_id).await?;
    let ticket_type = CatalogRepository::new(state.pool())
        .create_ticket_type(&input)
        .await?;
    state.catalog().invalidate_all().await;
    tracing::info!(ticket_type_id = %ticket_type.id, "Ticket type created");
    Ok((StatusCode::CREATED, Json(ticket_type)))
}

#[instrument(skip(state, input))]
pub async fn update_ticket_type(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<TicketTypeId>,
    JsonBody(input): JsonBody<TicketTypeInput>,
) -> Result<Json<TicketType>> {
    let input = input.validate()?;
    ensure_event_exists(&state, input.event_id).await?;
    let ticket_type = CatalogRepository::new(state.pool())
        .update_ticket_type(id, &input)
        .await?;
    state.catalog().invalidate_all().await;
    Ok(Json(ticket_type))
}

#[instrument(skip(state))]
pub async fn set_ticket_type_active(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<TicketTypeId>,
    JsonBody(request): JsonBody<SetActiveRequest>,
) -> Result<Json<TicketType>> {
    let ticket_type = CatalogRepository::new(state.pool())
        .set_ticket_type_active(id, request.is_active)
        .await?;
    state.catalog().invalidate_all().await;
    Ok(Json(ticket_type))
}

#[instrument(skip(state))]
pub async fn delete_ticket_type(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<TicketTypeId>,
) -> Result<StatusCode> {
    CatalogRepository::new(state.pool())
        .delete_ticket_type(id)
        .await?;
    state.catalog().invalidate_all().await;
    tracing::info!(ticket_type_id = %id, "Ticket type deleted");
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Merchandise
// =============================================================================

#[instrument(skip(state))]
pub async fn list_merchandise(
    _admin: RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<Vec<Merchandise>>> {
    Ok(Json(
        CatalogRepository::new(state.pool())
            .list_merchandise()
            .await?,
    ))
}

#[instrument(skip(state))]
pub async fn show_merchandise(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<MerchandiseId>,
) -> Result<Json<Merchandise>> {
    CatalogRepository::new(state.pool())
        .get_merchandise(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Merchandise".to_string()))
}

#[instrument(skip(state, input))]
pub async fn create_merchandise(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    JsonBody(input): JsonBody<MerchandiseInput>,
) -> Result<(StatusCode, Json<Merchandise>)> {
    let input = input.validate()?;
    let item = CatalogRepository::new(state.pool())
        .create_merchandise(&input)
        .await?;
    state.catalog().invalidate_all().await;
    tracing::info!(merchandise_id = %item.id, "Merchandise created");
    Ok((StatusCode::CREATED, Json(item)))
}

#[instrument(skip(state, input))]
pub async fn update_merchandise(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<MerchandiseId>,
    JsonBody(input): JsonBody<MerchandiseInput>,
) -> Result<Json<Merchandise>> {
    let input = input.validate()?;
    let item = CatalogRepository::new(state.pool())
        .update_merchandise(id, &input)
        .await?;
    state.catalog().invalidate_all().await;
    Ok(Json(item))
}

#[instrument(skip(state))]
pub async fn set_merchandise_active(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<MerchandiseId>,
    JsonBody(request): JsonBody<SetActiveRequest>,
) -> Result<Json<Merchandise>> {
    let item = CatalogRepository::new(state.pool())
        .set_merchandise_active(id, request.is_active)
        .await?;
    state.catalog().invalidate_all().await;
    Ok(Json(item))
}

#[instrument(skip(state))]
pub async fn delete_merchandise(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<MerchandiseId>,
) -> Result<StatusCode> {
    CatalogRepository::new(state.pool())
        .delete_merchandise(id)
        .await?;
    state.catalog().invalidate_all().await;
    tracing::info!(merchandise_id = %id, "Merchandise deleted");
    Ok(StatusCode::NO_CONTENT)
}
