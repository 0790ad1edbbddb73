//! Integration tests for Ticket Booth.
//!
//! # Running Tests
//!
//! ```bash
//! # Migrate and start the storefront
//! cargo run -p ticket-booth-cli -- migrate
//! cargo run -p ticket-booth-storefront
//!
//! # Run the ignored end-to-end tests
//! cargo test -p ticket-booth-integration-tests -- --ignored
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_BASE_URL` - Server under test (default `http://localhost:3000`)
//! - `ADMIN_API_TOKEN` - Same token the server was started with

use reqwest::Client;
use serde_json::{Value, json};
use uuid::Uuid;

/// Clients and URLs for one test.
pub struct TestContext {
    pub base_url: String,
    /// Buyer client with its own cookie jar (and therefore its own cart).
    pub buyer: Client,
    /// Client that sends the admin bearer token.
    pub admin: Client,
}

impl TestContext {
    /// Build clients from the environment.
    ///
    /// # Panics
    ///
    /// Panics if `ADMIN_API_TOKEN` is not set or a client cannot be built.
    #[must_use]
    pub fn new() -> Self {
        dotenvy::dotenv().ok();
        let base_url = std::env::var("STOREFRONT_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());
        let token = std::env::var("ADMIN_API_TOKEN").expect("ADMIN_API_TOKEN must be set");

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::AUTHORIZATION,
            format!("Bearer {token}")
                .parse()
                .expect("valid authorization header"),
        );

        Self {
            base_url,
            buyer: Self::buyer_client(),
            admin: Client::builder()
                .default_headers(headers)
                .build()
                .expect("Failed to create admin client"),
        }
    }

    /// A fresh buyer session.
    ///
    /// # Panics
    ///
    /// Panics if the client cannot be built.
    #[must_use]
    pub fn buyer_client() -> Client {
        Client::builder()
            .cookie_store(true)
            .build()
            .expect("Failed to create buyer client")
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Create an active event with one ticket type; returns `(event, ticket_type)`.
    ///
    /// # Panics
    ///
    /// Panics if the admin API rejects either request.
    pub async fn create_event_with_tickets(&self, price: &str, available: i32) -> (Value, Value) {
        let event: Value = self
            .admin
            .post(self.url("/admin/api/events"))
            .json(&json!({
                "name": format!("Test Event {}", Uuid::new_v4()),
                "venue": "Test Hall",
                "starts_at": "2027-01-15T19:00:00Z",
            }))
            .send()
            .await
            .expect("create event")
            .error_for_status()
            .expect("event created")
            .json()
            .await
            .expect("event json");

        let ticket_type: Value = self
            .admin
            .post(self.url("/admin/api/ticket-types"))
            .json(&json!({
                "event_id": event["id"],
                "name": "General Admission",
                "price": price,
                "available": available,
            }))
            .send()
            .await
            .expect("create ticket type")
            .error_for_status()
            .expect("ticket type created")
            .json()
            .await
            .expect("ticket type json");

        (event, ticket_type)
    }

    /// Fetch the buyer's cart.
    ///
    /// # Panics
    ///
    /// Panics if the request fails.
    pub async fn cart(&self, buyer: &Client) -> Value {
        buyer
            .get(self.url("/api/cart"))
            .send()
            .await
            .expect("get cart")
            .error_for_status()
            .expect("cart ok")
            .json()
            .await
            .expect("cart json")
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Checkout body for a PayPal buyer.
#[must_use]
pub fn paypal_checkout(email: &str) -> Value {
    json!({
        "customer_email": email,
        "customer_phone": "555-0100",
        "payment_method": "paypal",
        "payment_email": email,
    })
}
