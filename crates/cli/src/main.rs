//! Ticket Booth CLI - Database migrations, catalog seeding and secrets.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! tb-cli migrate
//!
//! # Load events, ticket types and merchandise from YAML
//! tb-cli seed catalog crates/cli/seed/catalog.yaml
//!
//! # Validate a catalog file without touching the database
//! tb-cli seed catalog crates/cli/seed/catalog.yaml --dry-run
//!
//! # Generate a value for ADMIN_API_TOKEN
//! tb-cli token generate
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "tb-cli")]
#[command(author, version, about = "Ticket Booth CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run storefront database migrations
    Migrate,
    /// Seed the database
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
    /// Manage API tokens
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Load events, ticket types and merchandise from a YAML file
    Catalog {
        /// Path to the catalog YAML file
        file: String,

        /// Validate the file without writing to the database
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
enum TokenAction {
    /// Print a random token suitable for `ADMIN_API_TOKEN`
    Generate {
        /// Token length in characters (minimum 32)
        #[arg(short, long, default_value_t = commands::token::DEFAULT_LENGTH)]
        length: usize,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::storefront().await?,
        Commands::Seed { target } => match target {
            SeedTarget::Catalog { file, dry_run } => {
                commands::seed::catalog(&file, dry_run).await?;
            }
        },
        Commands::Token { action } => match action {
            TokenAction::Generate { length } => commands::token::generate(length)?,
        },
    }
    Ok(())
}
