//! Cart, checkout, order and attendee workflows.
//!
//! Each public method runs in a single Postgres transaction. Rows that a
//! workflow reads and then writes are locked with `SELECT ... FOR UPDATE`, the
//! business rules from `ticket_booth_core` run against the locked values, and
//! the result is written back before commit. Dropping the transaction on an
//! error rolls everything back.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use thiserror::Error;
use uuid::Uuid;

use ticket_booth_core::{
    Attendee, AttendeeError, AttendeeId, AttendeeInput, Cart, CartError, CartId, CatalogError,
    CheckoutError, CheckoutInput, ItemRef, ItemType, NewCart, Order, OrderError, OrderId,
    TicketCode, VariantSelections, checkout,
};

use crate::db::{AttendeeRepository, CartRepository, CatalogRepository, OrderRepository, RepositoryError};

/// Attempts at finding an unused ticket code before giving up.
const TICKET_CODE_ATTEMPTS: usize = 5;

/// Errors from commerce workflows.
#[derive(Debug, Error)]
pub enum CommerceError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Attendee(#[from] AttendeeError),

    #[error("cart not found")]
    CartNotFound,

    #[error("order not found")]
    OrderNotFound,

    #[error("{0} not found")]
    ItemNotFound(String),

    #[error("attendee not found")]
    AttendeeNotFound,

    #[error("could not allocate a unique ticket code")]
    TicketCodeExhausted,
}

impl From<sqlx::Error> for CommerceError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(e))
    }
}

/// Body of the add-to-cart request.
#[derive(Debug, Clone, Deserialize)]
pub struct AddItemRequest {
    pub item_type: ItemType,
    pub item_id: i32,
    pub quantity: u32,
    #[serde(default)]
    pub variant_selections: Option<VariantSelections>,
}

/// Commerce workflows over the storefront database.
#[derive(Clone)]
pub struct CommerceService {
    pool: PgPool,
    cart_ttl: Duration,
}

impl CommerceService {
    /// Create a new commerce service.
    #[must_use]
    pub const fn new(pool: PgPool, cart_ttl: Duration) -> Self {
        Self { pool, cart_ttl }
    }

    // =========================================================================
    // Carts
    // =========================================================================

    /// Return the session's active cart, creating one if needed.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::Repository` if a query fails.
    #[tracing::instrument(skip(self, session_token))]
    pub async fn get_or_create_cart(
        &self,
        session_token: &str,
        now: DateTime<Utc>,
    ) -> Result<Cart, CommerceError> {
        let carts = CartRepository::new(&self.pool);
        if let Some(cart) = carts.find_active_for_session(session_token, now).await? {
            return Ok(cart);
        }
        let cart = carts
            .create(&NewCart {
                session_id: session_token.to_owned(),
                user_id: None,
                expires_at: now + self.cart_ttl,
            })
            .await?;
        tracing::info!(cart_id = %cart.id, "Created cart");
        Ok(cart)
    }

    /// Add an item to a cart.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::CartNotFound` unless the cart belongs to the
    /// session, `CommerceError::ItemNotFound` for an unknown item, or the cart
    /// and catalog rule errors.
    #[tracing::instrument(skip(self, session_token, request), fields(item_type = %request.item_type, item_id = request.item_id, quantity = request.quantity))]
    pub async fn add_item(
        &self,
        session_token: &str,
        cart_id: CartId,
        request: AddItemRequest,
        now: DateTime<Utc>,
    ) -> Result<Cart, CommerceError> {
        let mut tx = self.pool.begin().await?;
        let mut cart = lock_owned_cart(&mut tx, cart_id, session_token).await?;

        let item = ItemRef {
            item_type: request.item_type,
            item_id: request.item_id,
        };
        let catalog_item = CatalogRepository::find_item(&mut tx, item)
            .await?
            .ok_or_else(|| CommerceError::ItemNotFound(item.item_type.to_string()))?;

        cart.add_item(&catalog_item, request.quantity, request.variant_selections, now)?;
        self.save_cart(&mut tx, &mut cart, now).await?;
        tx.commit().await?;

        Ok(cart)
    }

    /// Set the quantity of a cart line; zero or less removes it.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::CartNotFound` or the cart rule errors.
    #[tracing::instrument(skip(self, session_token))]
    pub async fn update_item_quantity(
        &self,
        session_token: &str,
        cart_id: CartId,
        index: usize,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> Result<Cart, CommerceError> {
        self.mutate_cart(session_token, cart_id, now, |cart| {
            cart.update_item_quantity(index, quantity, now)
        })
        .await
    }

    /// Remove a cart line.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::CartNotFound` or the cart rule errors.
    #[tracing::instrument(skip(self, session_token))]
    pub async fn remove_item(
        &self,
        session_token: &str,
        cart_id: CartId,
        index: usize,
        now: DateTime<Utc>,
    ) -> Result<Cart, CommerceError> {
        self.mutate_cart(session_token, cart_id, now, |cart| cart.remove_item(index, now))
            .await
    }

    /// Remove every cart line.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::CartNotFound` or the cart rule errors.
    #[tracing::instrument(skip(self, session_token))]
    pub async fn clear_cart(
        &self,
        session_token: &str,
        cart_id: CartId,
        now: DateTime<Utc>,
    ) -> Result<Cart, CommerceError> {
        self.mutate_cart(session_token, cart_id, now, |cart| cart.clear(now))
            .await
    }

    async fn mutate_cart<F>(
        &self,
        session_token: &str,
        cart_id: CartId,
        now: DateTime<Utc>,
        mutate: F,
    ) -> Result<Cart, CommerceError>
    where
        F: FnOnce(&mut Cart) -> Result<(), CartError> + Send,
    {
        let mut tx = self.pool.begin().await?;
        let mut cart = lock_owned_cart(&mut tx, cart_id, session_token).await?;
        mutate(&mut cart)?;
        self.save_cart(&mut tx, &mut cart, now).await?;
        tx.commit().await?;
        Ok(cart)
    }

    async fn save_cart(
        &self,
        conn: &mut PgConnection,
        cart: &mut Cart,
        now: DateTime<Utc>,
    ) -> Result<(), CommerceError> {
        cart.renew(now + self.cart_ttl);
        CartRepository::save(conn, cart).await?;
        Ok(())
    }

    // =========================================================================
    // Checkout and orders
    // =========================================================================

    /// Convert the session's cart into a pending order.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::CartNotFound`, `CommerceError::Checkout` for an
    /// empty or converted cart or invalid contact details.
    #[tracing::instrument(skip(self, session_token, input), fields(payment_method = %input.payment_method))]
    pub async fn checkout(
        &self,
        session_token: &str,
        cart_id: CartId,
        input: CheckoutInput,
        now: DateTime<Utc>,
    ) -> Result<Order, CommerceError> {
        let details = input.validate()?;

        let mut tx = self.pool.begin().await?;
        let mut cart = lock_owned_cart(&mut tx, cart_id, session_token).await?;
        let new_order = checkout(&mut cart, details, now)?;
        let order = OrderRepository::insert(&mut tx, &new_order).await?;
        CartRepository::save(&mut tx, &cart).await?;
        tx.commit().await?;

        tracing::info!(order = %order.reference, total = %order.total, "Order placed");
        Ok(order)
    }

    /// Buyer-side completion: record the payment reference for an order
    /// identified by its public reference.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::OrderNotFound`, `OrderError::AlreadyCompleted`,
    /// or `CatalogError::InsufficientInventory` if any line can no longer be
    /// fulfilled (nothing is applied in that case).
    #[tracing::instrument(skip(self, confirmation))]
    pub async fn complete_order_by_reference(
        &self,
        reference: Uuid,
        confirmation: &str,
        now: DateTime<Utc>,
    ) -> Result<Order, CommerceError> {
        let mut tx = self.pool.begin().await?;
        let order = OrderRepository::lock_by_reference(&mut tx, reference)
            .await?
            .ok_or(CommerceError::OrderNotFound)?;
        let order = complete_locked(&mut tx, order, confirmation, now).await?;
        tx.commit().await?;
        Ok(order)
    }

    /// Staff-side completion on behalf of a buyer.
    ///
    /// # Errors
    ///
    /// Same as [`CommerceService::complete_order_by_reference`].
    #[tracing::instrument(skip(self, confirmation))]
    pub async fn complete_order(
        &self,
        id: OrderId,
        confirmation: &str,
        now: DateTime<Utc>,
    ) -> Result<Order, CommerceError> {
        let mut tx = self.pool.begin().await?;
        let order = OrderRepository::lock(&mut tx, id)
            .await?
            .ok_or(CommerceError::OrderNotFound)?;
        let order = complete_locked(&mut tx, order, confirmation, now).await?;
        tx.commit().await?;
        Ok(order)
    }

    /// Mark a completed order's payment as verified.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::OrderNotFound`, `OrderError::NotCompleted` or
    /// `OrderError::AlreadyVerified`.
    #[tracing::instrument(skip(self))]
    pub async fn verify_payment(
        &self,
        id: OrderId,
        now: DateTime<Utc>,
    ) -> Result<Order, CommerceError> {
        let mut tx = self.pool.begin().await?;
        let mut order = OrderRepository::lock(&mut tx, id)
            .await?
            .ok_or(CommerceError::OrderNotFound)?;
        order.verify_payment(now)?;
        OrderRepository::save_payment(&mut tx, &order).await?;
        tx.commit().await?;

        tracing::info!(order = %order.reference, "Payment verified");
        Ok(order)
    }

    /// An order and its attendees, for the confirmation page.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::OrderNotFound` or `CommerceError::Repository`.
    pub async fn order_with_attendees(
        &self,
        reference: Uuid,
    ) -> Result<(Order, Vec<Attendee>), CommerceError> {
        let order = OrderRepository::new(&self.pool)
            .get_by_reference(reference)
            .await?
            .ok_or(CommerceError::OrderNotFound)?;
        let attendees = AttendeeRepository::new(&self.pool)
            .list_for_order(order.id)
            .await?;
        Ok((order, attendees))
    }

    // =========================================================================
    // Attendees
    // =========================================================================

    /// Register a ticket holder on an order.
    ///
    /// The order row is locked so concurrent registrations cannot exceed the
    /// purchased quantity. Inventory is not touched.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::OrderNotFound`, `AttendeeError` for a ticket type
    /// outside the order, no remaining tickets or invalid fields, or
    /// `CommerceError::TicketCodeExhausted`.
    #[tracing::instrument(skip(self, input), fields(ticket_type_id = %input.ticket_type_id))]
    pub async fn add_attendee(
        &self,
        reference: Uuid,
        input: AttendeeInput,
    ) -> Result<Attendee, CommerceError> {
        let mut tx = self.pool.begin().await?;
        let order = OrderRepository::lock_by_reference(&mut tx, reference)
            .await?
            .ok_or(CommerceError::OrderNotFound)?;
        let registered =
            AttendeeRepository::count_for_ticket_type(&mut tx, order.id, input.ticket_type_id)
                .await?;
        let mut new_attendee = input.validate(&order, registered, &mut rand::rng())?;

        for _ in 0..TICKET_CODE_ATTEMPTS {
            if let Some(attendee) = AttendeeRepository::insert(&mut tx, &new_attendee).await? {
                tx.commit().await?;
                tracing::info!(attendee_id = %attendee.id, order = %order.reference, "Attendee registered");
                return Ok(attendee);
            }
            tracing::debug!("Ticket code collision, retrying");
            new_attendee.ticket_code = TicketCode::generate(&mut rand::rng());
        }
        Err(CommerceError::TicketCodeExhausted)
    }

    /// Check an attendee in at the door.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::AttendeeNotFound` or
    /// `AttendeeError::AlreadyCheckedIn`.
    #[tracing::instrument(skip(self))]
    pub async fn check_in(
        &self,
        id: AttendeeId,
        now: DateTime<Utc>,
    ) -> Result<Attendee, CommerceError> {
        self.mutate_attendee(id, |attendee| attendee.check_in(now))
            .await
    }

    /// Undo a check-in.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::AttendeeNotFound` or
    /// `AttendeeError::NotCheckedIn`.
    #[tracing::instrument(skip(self))]
    pub async fn undo_check_in(&self, id: AttendeeId) -> Result<Attendee, CommerceError> {
        self.mutate_attendee(id, Attendee::undo_check_in).await
    }

    async fn mutate_attendee<F>(&self, id: AttendeeId, mutate: F) -> Result<Attendee, CommerceError>
    where
        F: FnOnce(&mut Attendee) -> Result<(), AttendeeError> + Send,
    {
        let mut tx = self.pool.begin().await?;
        let mut attendee = AttendeeRepository::lock(&mut tx, id)
            .await?
            .ok_or(CommerceError::AttendeeNotFound)?;
        mutate(&mut attendee)?;
        AttendeeRepository::save_check_in(&mut tx, &attendee).await?;
        tx.commit().await?;
        Ok(attendee)
    }
}

/// Lock a cart that belongs to `session_token`. Another session's cart is
/// reported as missing.
async fn lock_owned_cart(
    conn: &mut PgConnection,
    cart_id: CartId,
    session_token: &str,
) -> Result<Cart, CommerceError> {
    CartRepository::lock(conn, cart_id)
        .await?
        .filter(|cart| cart.session_id == session_token)
        .ok_or(CommerceError::CartNotFound)
}

/// Complete a locked order and apply its inventory adjustments.
///
/// Adjustments come sorted by item, so concurrent completions lock catalog
/// rows in the same order.
async fn complete_locked(
    conn: &mut PgConnection,
    mut order: Order,
    confirmation: &str,
    now: DateTime<Utc>,
) -> Result<Order, CommerceError> {
    let adjustments = order.complete(confirmation, now)?;

    for adjustment in adjustments {
        if !CatalogRepository::record_sale(conn, adjustment).await? {
            let (name, available) = CatalogRepository::find_item(conn, adjustment.item)
                .await?
                .map_or_else(
                    || (adjustment.item.item_type.to_string(), 0),
                    |item| (item.name, item.available),
                );
            tracing::warn!(
                order = %order.reference,
                item_id = adjustment.item.item_id,
                requested = adjustment.quantity,
                available,
                "Order completion blocked by inventory"
            );
            return Err(CatalogError::InsufficientInventory {
                name,
                requested: adjustment.quantity,
                available,
            }
            .into());
        }
    }

    OrderRepository::save_payment(conn, &order).await?;
    tracing::info!(order = %order.reference, "Order completed");
    Ok(order)
}
