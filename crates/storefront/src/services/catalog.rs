//! Public catalog reads with an in-memory cache.
//!
//! Active events and merchandise are cached with `moka` for one minute.
//! Admin writes and order completions call [`CatalogService::invalidate_all`]
//! so buyers see new prices and inventory right away.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;
use tracing::debug;

use ticket_booth_core::{EventId, EventWithTicketTypes, Merchandise};

use crate::db::{CatalogRepository, RepositoryError};

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
enum CacheKey {
    Events,
    Event(EventId),
    Merchandise,
}

#[derive(Debug, Clone)]
enum CacheValue {
    Events(Arc<Vec<EventWithTicketTypes>>),
    Event(Arc<EventWithTicketTypes>),
    Merchandise(Arc<Vec<Merchandise>>),
}

/// Cached read access to the active catalog.
#[derive(Clone)]
pub struct CatalogService {
    pool: PgPool,
    cache: Cache<CacheKey, CacheValue>,
}

impl CatalogService {
    /// Create a new catalog service.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        let cache = Cache::builder()
            .max_capacity(256)
            .time_to_live(Duration::from_secs(60))
            .build();
        Self { pool, cache }
    }

    /// Active events with their active ticket types.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails.
    pub async fn active_events(&self) -> Result<Arc<Vec<EventWithTicketTypes>>, RepositoryError> {
        if let Some(CacheValue::Events(events)) = self.cache.get(&CacheKey::Events).await {
            debug!("Cache hit for events");
            return Ok(events);
        }
        let events = Arc::new(
            CatalogRepository::new(&self.pool)
                .list_active_events()
                .await?,
        );
        self.cache
            .insert(CacheKey::Events, CacheValue::Events(Arc::clone(&events)))
            .await;
        Ok(events)
    }

    /// One active event; `None` if missing or inactive.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails.
    pub async fn active_event(
        &self,
        id: EventId,
    ) -> Result<Option<Arc<EventWithTicketTypes>>, RepositoryError> {
        let key = CacheKey::Event(id);
        if let Some(CacheValue::Event(event)) = self.cache.get(&key).await {
            debug!(event_id = %id, "Cache hit for event");
            return Ok(Some(event));
        }
        let Some(event) = CatalogRepository::new(&self.pool)
            .get_active_event(id)
            .await?
        else {
            return Ok(None);
        };
        let event = Arc::new(event);
        self.cache
            .insert(key, CacheValue::Event(Arc::clone(&event)))
            .await;
        Ok(Some(event))
    }

    /// Active merchandise.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails.
    pub async fn active_merchandise(&self) -> Result<Arc<Vec<Merchandise>>, RepositoryError> {
        if let Some(CacheValue::Merchandise(items)) = self.cache.get(&CacheKey::Merchandise).await
        {
            debug!("Cache hit for merchandise");
            return Ok(items);
        }
        let items = Arc::new(
            CatalogRepository::new(&self.pool)
                .list_active_merchandise()
                .await?,
        );
        self.cache
            .insert(
                CacheKey::Merchandise,
                CacheValue::Merchandise(Arc::clone(&items)),
            )
            .await;
        Ok(items)
    }

    /// Drop every cached entry.
    pub async fn invalidate_all(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
    }
}
