//! Seed the catalog from a YAML file.
//!
//! ```yaml
//! events:
//!   - name: Summer Festival
//!     venue: Riverside Park
//!     starts_at: 2026-07-18T16:00:00Z
//!     ends_at: 2026-07-18T23:00:00Z
//!     ticket_types:
//!       - name: General Admission
//!         price: "50.00"
//!         available: 500
//! merchandise:
//!   - name: Festival Shirt
//!     price: "25.00"
//!     available: 120
//!     variant_options:
//!       - name: Size
//!         values: [S, M, L]
//! ```
//!
//! The whole file is validated before anything is written. Events and
//! merchandise whose name already exists are skipped, so re-running a seed is
//! safe.

use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{error, info};

use ticket_booth_core::{EventId, EventInput, MerchandiseInput, TicketTypeInput};
use ticket_booth_storefront::db::{self, CatalogRepository};

use super::migrate::database_url;

/// Top-level catalog file.
#[derive(Debug, Deserialize)]
pub struct CatalogSeed {
    #[serde(default)]
    pub events: Vec<EventSeed>,
    #[serde(default)]
    pub merchandise: Vec<MerchandiseInput>,
}

/// An event and the ticket types sold for it.
#[derive(Debug, Deserialize)]
pub struct EventSeed {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub venue: Option<String>,
    pub starts_at: DateTime<Utc>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ticket_types: Vec<TicketTypeSeed>,
}

#[derive(Debug, Deserialize)]
pub struct TicketTypeSeed {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Decimal,
    pub available: i32,
}

impl EventSeed {
    fn input(&self) -> EventInput {
        EventInput {
            name: self.name.clone(),
            description: self.description.clone(),
            venue: self.venue.clone(),
            starts_at: self.starts_at,
            ends_at: self.ends_at,
            is_active: true,
        }
    }
}

impl TicketTypeSeed {
    fn input(&self, event_id: EventId) -> TicketTypeInput {
        TicketTypeInput {
            event_id,
            name: self.name.clone(),
            description: self.description.clone(),
            price: self.price,
            available: self.available,
            is_active: true,
        }
    }
}

/// Validate every entry, returning one message per problem.
#[must_use]
pub fn validate_seed(seed: &CatalogSeed) -> Vec<String> {
    let mut errors = Vec::new();

    for event in &seed.events {
        if let Err(e) = event.input().validate() {
            errors.push(format!("event {:?}: {e}", event.name));
        }
        for ticket_type in &event.ticket_types {
            // Event ID is assigned on insert
            if let Err(e) = ticket_type.input(EventId::new(0)).validate() {
                errors.push(format!(
                    "ticket type {:?} of {:?}: {e}",
                    ticket_type.name, event.name
                ));
            }
        }
    }
    for item in &seed.merchandise {
        if let Err(e) = item.clone().validate() {
            errors.push(format!("merchandise {:?}: {e}", item.name));
        }
    }

    errors
}

/// Seed counters.
#[derive(Debug, Default)]
pub struct SeedResult {
    pub events: usize,
    pub ticket_types: usize,
    pub merchandise: usize,
    pub skipped: usize,
}

/// Load and apply a catalog file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, validation fails,
/// or a database operation fails.
pub async fn catalog(file_path: &str, dry_run: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading catalog from file");
    let content = tokio::fs::read_to_string(path).await?;
    let seed: CatalogSeed = serde_yaml::from_str(&content)?;
    info!(
        events = seed.events.len(),
        merchandise = seed.merchandise.len(),
        "Parsed catalog"
    );

    let errors = validate_seed(&seed);
    if !errors.is_empty() {
        error!("Catalog validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(format!("{} validation errors found", errors.len()).into());
    }
    info!("Catalog validated successfully");

    if dry_run {
        info!("Dry run; nothing written");
        return Ok(());
    }

    let pool = db::create_pool(&database_url()?).await?;
    info!("Connected to database");

    let result = apply(&CatalogRepository::new(&pool), seed).await?;

    info!("Seeding complete!");
    info!("  Events created: {}", result.events);
    info!("  Ticket types created: {}", result.ticket_types);
    info!("  Merchandise created: {}", result.merchandise);
    info!("  Skipped (already exist): {}", result.skipped);
    Ok(())
}

async fn apply(
    catalog: &CatalogRepository<'_>,
    seed: CatalogSeed,
) -> Result<SeedResult, Box<dyn std::error::Error>> {
    let mut result = SeedResult::default();

    let existing_events: HashSet<String> = catalog
        .list_events()
        .await?
        .into_iter()
        .map(|e| e.name)
        .collect();
    for event in seed.events {
        if existing_events.contains(event.name.trim()) {
            info!(event = %event.name, "Event exists, skipping");
            result.skipped += 1;
            continue;
        }
        let created = catalog.create_event(&event.input().validate()?).await?;
        result.events += 1;

        for ticket_type in &event.ticket_types {
            catalog
                .create_ticket_type(&ticket_type.input(created.id).validate()?)
                .await?;
            result.ticket_types += 1;
        }
    }

    let existing_merchandise: HashSet<String> = catalog
        .list_merchandise()
        .await?
        .into_iter()
        .map(|m| m.name)
        .collect();
    for item in seed.merchandise {
        if existing_merchandise.contains(item.name.trim()) {
            info!(merchandise = %item.name, "Merchandise exists, skipping");
            result.skipped += 1;
            continue;
        }
        catalog.create_merchandise(&item.validate()?).await?;
        result.merchandise += 1;
    }

    Ok(result)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
events:
  - name: Summer Festival
    venue: Riverside Park
    starts_at: 2026-07-18T16:00:00Z
    ends_at: 2026-07-18T23:00:00Z
    ticket_types:
      - name: General Admission
        price: "50.00"
        available: 500
      - name: VIP
        price: "120.00"
        available: 50
merchandise:
  - name: Festival Shirt
    price: "25.00"
    available: 120
    variant_options:
      - name: Size
        values: [S, M, L]
"#;

    #[test]
    fn test_parse_sample() {
        let seed: CatalogSeed = serde_yaml::from_str(SAMPLE).unwrap();
        assert_eq!(seed.events.len(), 1);
        assert_eq!(seed.events[0].ticket_types.len(), 2);
        assert_eq!(seed.events[0].ticket_types[0].price, Decimal::new(5000, 2));
        assert_eq!(seed.merchandise[0].variant_options[0].values.len(), 3);
        assert!(validate_seed(&seed).is_empty());
    }

    #[test]
    fn test_validation_collects_every_error() {
        let yaml = r#"
events:
  - name: "  "
    starts_at: 2026-07-18T16:00:00Z
    ends_at: 2026-07-17T16:00:00Z
    ticket_types:
      - name: Free
        price: "-1"
        available: 10
merchandise:
  - name: Poster
    price: "10"
    available: -3
"#;
        let seed: CatalogSeed = serde_yaml::from_str(yaml).unwrap();
        let errors = validate_seed(&seed);
        assert_eq!(errors.len(), 3);
        assert!(errors[1].contains("ticket type"));
        assert!(errors[2].contains("Poster"));
    }
}
