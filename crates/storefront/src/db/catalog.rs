//! Catalog repository: events, ticket types and merchandise.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use ticket_booth_core::catalog::ItemRef;
use ticket_booth_core::{
    CatalogItem, Event, EventId, EventInput, EventWithTicketTypes, InventoryAdjustment, ItemType,
    Merchandise, MerchandiseId, MerchandiseInput, TicketType, TicketTypeId, TicketTypeInput,
    VariantOption,
};

use super::RepositoryError;

// =============================================================================
// Internal Row Types
// =============================================================================

const EVENT_COLUMNS: &str =
    "id, name, description, venue, starts_at, ends_at, is_active, created_at, updated_at";
const TICKET_TYPE_COLUMNS: &str = "id, event_id, name, description, price, available, sold, \
     is_active, created_at, updated_at";
const MERCHANDISE_COLUMNS: &str = "id, name, description, price, available, sold, \
     variant_options, is_active, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct EventRow {
    id: i32,
    name: String,
    description: Option<String>,
    venue: Option<String>,
    starts_at: DateTime<Utc>,
    ends_at: Option<DateTime<Utc>>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<EventRow> for Event {
    fn from(row: EventRow) -> Self {
        Self {
            id: EventId::new(row.id),
            name: row.name,
            description: row.description,
            venue: row.venue,
            starts_at: row.starts_at,
            ends_at: row.ends_at,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TicketTypeRow {
    id: i32,
    event_id: i32,
    name: String,
    description: Option<String>,
    price: Decimal,
    available: i32,
    sold: i32,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TicketTypeRow> for TicketType {
    fn from(row: TicketTypeRow) -> Self {
        Self {
            id: TicketTypeId::new(row.id),
            event_id: EventId::new(row.event_id),
            name: row.name,
            description: row.description,
            price: row.price,
            available: row.available,
            sold: row.sold,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MerchandiseRow {
    id: i32,
    name: String,
    description: Option<String>,
    price: Decimal,
    available: i32,
    sold: i32,
    variant_options: Json<Vec<VariantOption>>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<MerchandiseRow> for Merchandise {
    fn from(row: MerchandiseRow) -> Self {
        Self {
            id: MerchandiseId::new(row.id),
            name: row.name,
            description: row.description,
            price: row.price,
            available: row.available,
            sold: row.sold,
            variant_options: row.variant_options.0,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn group_ticket_types(
    events: Vec<Event>,
    ticket_types: Vec<TicketType>,
) -> Vec<EventWithTicketTypes> {
    let mut by_event: HashMap<EventId, Vec<TicketType>> = HashMap::new();
    for ticket_type in ticket_types {
        by_event.entry(ticket_type.event_id).or_default().push(ticket_type);
    }
    events
        .into_iter()
        .map(|event| EventWithTicketTypes {
            ticket_types: by_event.remove(&event.id).unwrap_or_default(),
            event,
        })
        .collect()
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for catalog database operations.
pub struct CatalogRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CatalogRepository<'a> {
    /// Create a new catalog repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Public catalog
    // =========================================================================

    /// Active events, soonest first, each with its active ticket types.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_active_events(&self) -> Result<Vec<EventWithTicketTypes>, RepositoryError> {
        let events: Vec<Event> = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {EVENT_COLUMNS} FROM booth.event WHERE is_active ORDER BY starts_at, id"
        ))
        .fetch_all(self.pool)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

        let ids: Vec<i32> = events.iter().map(|e| e.id.as_i32()).collect();
        let ticket_types: Vec<TicketType> = sqlx::query_as::<_, TicketTypeRow>(&format!(
            "SELECT {TICKET_TYPE_COLUMNS} FROM booth.ticket_type \
             WHERE is_active AND event_id = ANY($1) ORDER BY price, id"
        ))
        .bind(&ids)
        .fetch_all(self.pool)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

        Ok(group_ticket_types(events, ticket_types))
    }

    /// One active event with its active ticket types.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_active_event(
        &self,
        id: EventId,
    ) -> Result<Option<EventWithTicketTypes>, RepositoryError> {
        let Some(event) = self.get_event(id).await?.filter(|e| e.is_active) else {
            return Ok(None);
        };
        let ticket_types = self
            .list_ticket_types(Some(id))
            .await?
            .into_iter()
            .filter(|t| t.is_active)
            .collect();
        Ok(Some(EventWithTicketTypes {
            event,
            ticket_types,
        }))
    }

    /// Active merchandise by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_active_merchandise(&self) -> Result<Vec<Merchandise>, RepositoryError> {
        let rows = sqlx::query_as::<_, MerchandiseRow>(&format!(
            "SELECT {MERCHANDISE_COLUMNS} FROM booth.merchandise WHERE is_active ORDER BY name, id"
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// All events, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_events(&self) -> Result<Vec<Event>, RepositoryError> {
        let rows = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {EVENT_COLUMNS} FROM booth.event ORDER BY starts_at DESC, id DESC"
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_event(&self, id: EventId) -> Result<Option<Event>, RepositoryError> {
        let row = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {EVENT_COLUMNS} FROM booth.event WHERE id = $1"
        ))
        .bind(id.as_i32())
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create_event(&self, input: &EventInput) -> Result<Event, RepositoryError> {
        let row = sqlx::query_as::<_, EventRow>(&format!(
            "INSERT INTO booth.event (name, description, venue, starts_at, ends_at, is_active) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {EVENT_COLUMNS}"
        ))
        .bind(&input.name)
        .bind(&input.description)
        .bind(&input.venue)
        .bind(input.starts_at)
        .bind(input.ends_at)
        .bind(input.is_active)
        .fetch_one(self.pool)
        .await?;
        Ok(row.into())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the event does not exist.
    pub async fn update_event(
        &self,
        id: EventId,
        input: &EventInput,
    ) -> Result<Event, RepositoryError> {
        let row = sqlx::query_as::<_, EventRow>(&format!(
            "UPDATE booth.event SET name = $2, description = $3, venue = $4, starts_at = $5, \
             ends_at = $6, is_active = $7, updated_at = NOW() \
             WHERE id = $1 RETURNING {EVENT_COLUMNS}"
        ))
        .bind(id.as_i32())
        .bind(&input.name)
        .bind(&input.description)
        .bind(&input.venue)
        .bind(input.starts_at)
        .bind(input.ends_at)
        .bind(input.is_active)
        .fetch_optional(self.pool)
        .await?;
        row.map(Into::into).ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the event does not exist.
    pub async fn set_event_active(
        &self,
        id: EventId,
        is_active: bool,
    ) -> Result<Event, RepositoryError> {
        let row = sqlx::query_as::<_, EventRow>(&format!(
            "UPDATE booth.event SET is_active = $2, updated_at = NOW() \
             WHERE id = $1 RETURNING {EVENT_COLUMNS}"
        ))
        .bind(id.as_i32())
        .bind(is_active)
        .fetch_optional(self.pool)
        .await?;
        row.map(Into::into).ok_or(RepositoryError::NotFound)
    }

    /// Delete an event.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` while ticket types still reference
    /// it, or `RepositoryError::NotFound`.
    pub async fn delete_event(&self, id: EventId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM booth.event WHERE id = $1")
            .bind(id.as_i32())
            .execute(self.pool)
            .await
            .map_err(|e| RepositoryError::from_constraint(e, "event still has ticket types"))?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    // =========================================================================
    // Ticket types
    // =========================================================================

    /// Ticket types, optionally for one event.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_ticket_types(
        &self,
        event_id: Option<EventId>,
    ) -> Result<Vec<TicketType>, RepositoryError> {
        let rows = sqlx::query_as::<_, TicketTypeRow>(&format!(
            "SELECT {TICKET_TYPE_COLUMNS} FROM booth.ticket_type \
             WHERE ($1::int IS NULL OR event_id = $1) ORDER BY event_id, price, id"
        ))
        .bind(event_id.map(|id| id.as_i32()))
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_ticket_type(
        &self,
        id: TicketTypeId,
    ) -> Result<Option<TicketType>, RepositoryError> {
        let row = sqlx::query_as::<_, TicketTypeRow>(&format!(
            "SELECT {TICKET_TYPE_COLUMNS} FROM booth.ticket_type WHERE id = $1"
        ))
        .bind(id.as_i32())
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the event does not exist.
    pub async fn create_ticket_type(
        &self,
        input: &TicketTypeInput,
    ) -> Result<TicketType, RepositoryError> {
        let row = sqlx::query_as::<_, TicketTypeRow>(&format!(
            "INSERT INTO booth.ticket_type (event_id, name, description, price, available, is_active) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {TICKET_TYPE_COLUMNS}"
        ))
        .bind(input.event_id.as_i32())
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.price)
        .bind(input.available)
        .bind(input.is_active)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, "event does not exist"))?;
        Ok(row.into())
    }

    /// Update a ticket type. `sold` is never changed here.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` or `RepositoryError::Conflict` if the
    /// new event does not exist.
    pub async fn update_ticket_type(
        &self,
        id: TicketTypeId,
        input: &TicketTypeInput,
    ) -> Result<TicketType, RepositoryError> {
        let row = sqlx::query_as::<_, TicketTypeRow>(&format!(
            "UPDATE booth.ticket_type SET event_id = $2, name = $3, description = $4, price = $5, \
             available = $6, is_active = $7, updated_at = NOW() \
             WHERE id = $1 RETURNING {TICKET_TYPE_COLUMNS}"
        ))
        .bind(id.as_i32())
        .bind(input.event_id.as_i32())
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.price)
        .bind(input.available)
        .bind(input.is_active)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, "event does not exist"))?;
        row.map(Into::into).ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the ticket type does not exist.
    pub async fn set_ticket_type_active(
        &self,
        id: TicketTypeId,
        is_active: bool,
    ) -> Result<TicketType, RepositoryError> {
        let row = sqlx::query_as::<_, TicketTypeRow>(&format!(
            "UPDATE booth.ticket_type SET is_active = $2, updated_at = NOW() \
             WHERE id = $1 RETURNING {TICKET_TYPE_COLUMNS}"
        ))
        .bind(id.as_i32())
        .bind(is_active)
        .fetch_optional(self.pool)
        .await?;
        row.map(Into::into).ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` while attendees hold tickets of this
    /// type, or `RepositoryError::NotFound`.
    pub async fn delete_ticket_type(&self, id: TicketTypeId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM booth.ticket_type WHERE id = $1")
            .bind(id.as_i32())
            .execute(self.pool)
            .await
            .map_err(|e| RepositoryError::from_constraint(e, "ticket type has attendees"))?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    // =========================================================================
    // Merchandise
    // =========================================================================

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_merchandise(&self) -> Result<Vec<Merchandise>, RepositoryError> {
        let rows = sqlx::query_as::<_, MerchandiseRow>(&format!(
            "SELECT {MERCHANDISE_COLUMNS} FROM booth.merchandise ORDER BY name, id"
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_merchandise(
        &self,
        id: MerchandiseId,
    ) -> Result<Option<Merchandise>, RepositoryError> {
        let row = sqlx::query_as::<_, MerchandiseRow>(&format!(
            "SELECT {MERCHANDISE_COLUMNS} FROM booth.merchandise WHERE id = $1"
        ))
        .bind(id.as_i32())
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create_merchandise(
        &self,
        input: &MerchandiseInput,
    ) -> Result<Merchandise, RepositoryError> {
        let row = sqlx::query_as::<_, MerchandiseRow>(&format!(
            "INSERT INTO booth.merchandise \
             (name, description, price, available, variant_options, is_active) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {MERCHANDISE_COLUMNS}"
        ))
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.price)
        .bind(input.available)
        .bind(Json(&input.variant_options))
        .bind(input.is_active)
        .fetch_one(self.pool)
        .await?;
        Ok(row.into())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the item does not exist.
    pub async fn update_merchandise(
        &self,
        id: MerchandiseId,
        input: &MerchandiseInput,
    ) -> Result<Merchandise, RepositoryError> {
        let row = sqlx::query_as::<_, MerchandiseRow>(&format!(
            "UPDATE booth.merchandise SET name = $2, description = $3, price = $4, \
             available = $5, variant_options = $6, is_active = $7, updated_at = NOW() \
             WHERE id = $1 RETURNING {MERCHANDISE_COLUMNS}"
        ))
        .bind(id.as_i32())
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.price)
        .bind(input.available)
        .bind(Json(&input.variant_options))
        .bind(input.is_active)
        .fetch_optional(self.pool)
        .await?;
        row.map(Into::into).ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the item does not exist.
    pub async fn set_merchandise_active(
        &self,
        id: MerchandiseId,
        is_active: bool,
    ) -> Result<Merchandise, RepositoryError> {
        let row = sqlx::query_as::<_, MerchandiseRow>(&format!(
            "UPDATE booth.merchandise SET is_active = $2, updated_at = NOW() \
             WHERE id = $1 RETURNING {MERCHANDISE_COLUMNS}"
        ))
        .bind(id.as_i32())
        .bind(is_active)
        .fetch_optional(self.pool)
        .await?;
        row.map(Into::into).ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the item does not exist.
    pub async fn delete_merchandise(&self, id: MerchandiseId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM booth.merchandise WHERE id = $1")
            .bind(id.as_i32())
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    // =========================================================================
    // Transactional helpers
    // =========================================================================

    /// Load the purchasable view of a ticket type or merchandise item.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_item(
        conn: &mut PgConnection,
        item: ItemRef,
    ) -> Result<Option<CatalogItem>, RepositoryError> {
        let found = match item.item_type {
            ItemType::Ticket => sqlx::query_as::<_, TicketTypeRow>(&format!(
                "SELECT {TICKET_TYPE_COLUMNS} FROM booth.ticket_type WHERE id = $1"
            ))
            .bind(item.item_id)
            .fetch_optional(&mut *conn)
            .await?
            .map(|row| CatalogItem::from(&TicketType::from(row))),
            ItemType::Merchandise => sqlx::query_as::<_, MerchandiseRow>(&format!(
                "SELECT {MERCHANDISE_COLUMNS} FROM booth.merchandise WHERE id = $1"
            ))
            .bind(item.item_id)
            .fetch_optional(&mut *conn)
            .await?
            .map(|row| CatalogItem::from(&Merchandise::from(row))),
        };
        Ok(found)
    }

    /// Move `quantity` units from `available` to `sold`, only if enough are
    /// available. Returns `false` when the guard fails.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn record_sale(
        conn: &mut PgConnection,
        adjustment: InventoryAdjustment,
    ) -> Result<bool, RepositoryError> {
        let table = match adjustment.item.item_type {
            ItemType::Ticket => "booth.ticket_type",
            ItemType::Merchandise => "booth.merchandise",
        };
        let quantity = i32::try_from(adjustment.quantity).map_err(|_| {
            RepositoryError::DataCorruption(format!(
                "quantity {} out of range",
                adjustment.quantity
            ))
        })?;
        let result = sqlx::query(&format!(
            "UPDATE {table} SET available = available - $1, sold = sold + $1, updated_at = NOW() \
             WHERE id = $2 AND available >= $1"
        ))
        .bind(quantity)
        .bind(adjustment.item.item_id)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
