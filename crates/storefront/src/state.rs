//! Application state shared across handlers.

use std::sync::Arc;

use chrono::Duration;
use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::services::{CatalogService, CommerceService, EmailClient, EmailError};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    catalog: CatalogService,
    commerce: CommerceService,
    email: Option<EmailClient>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration
    /// * `pool` - `PostgreSQL` connection pool
    ///
    /// # Errors
    ///
    /// Returns an error if the email client cannot be built from the
    /// configured API key and base URL.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, EmailError> {
        let email = config.email.as_ref().map(EmailClient::new).transpose()?;
        if email.is_none() {
            tracing::warn!("EMAIL_API_KEY not set; email sending is disabled");
        }

        let catalog = CatalogService::new(pool.clone());
        let commerce = CommerceService::new(pool.clone(), Duration::hours(config.cart_ttl_hours));

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                catalog,
                commerce,
                email,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Cached public catalog.
    #[must_use]
    pub fn catalog(&self) -> &CatalogService {
        &self.inner.catalog
    }

    /// Cart, checkout and attendee workflows.
    #[must_use]
    pub fn commerce(&self) -> &CommerceService {
        &self.inner.commerce
    }

    /// Email client, if `EMAIL_API_KEY` is configured.
    #[must_use]
    pub fn email(&self) -> Option<&EmailClient> {
        self.inner.email.as_ref()
    }
}
